//! Delivery Orders MCP Server
//!
//! Exposes the ordering workflow of the delivery backend as MCP tools so a
//! conversational agent can browse the catalog, collect precondition tokens
//! and place orders on behalf of a customer.

use std::borrow::Cow;
use std::sync::Arc;

use anyhow::Result;
use rmcp::{
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{ErrorData as McpError, *},
    schemars, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
    transport::stdio,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Clone)]
struct Config {
    backend_url: String,
}

impl Config {
    fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let backend_url = std::env::var("DELIVERY_BACKEND_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self { backend_url })
    }
}

// ============================================================================
// Backend API Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BackendErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Product {
    id: i32,
    name: String,
    #[serde(default)]
    description: Option<String>,
    price: String,
    stock: i32,
    active: bool,
}

// ============================================================================
// Backend API Client
// ============================================================================

struct BackendClient {
    client: reqwest::Client,
    config: Config,
}

impl BackendClient {
    fn new(config: Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            Ok(serde_json::from_str(&body)?)
        } else {
            let error: BackendErrorResponse =
                serde_json::from_str(&body).unwrap_or_else(|_| BackendErrorResponse {
                    error: body,
                    code: None,
                });
            anyhow::bail!("{} (code: {})", error.error, error.code.as_deref().unwrap_or("UNKNOWN"))
        }
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let url = format!("{}/api/products", self.config.backend_url);
        let value = self.send(self.client.get(&url)).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn check_inventory(&self, items: &[OrderLine]) -> Result<Value> {
        let url = format!("{}/api/inventory/check", self.config.backend_url);
        let body = json!({
            "items": items
                .iter()
                .map(|i| json!({ "product_id": i.product_id, "quantity": i.quantity }))
                .collect::<Vec<_>>()
        });
        self.send(self.client.post(&url).json(&body)).await
    }

    async fn create_payment(&self, amount_usd: &str, external_payment_id: Option<&str>) -> Result<Value> {
        let url = format!("{}/api/payments", self.config.backend_url);
        let body = json!({
            "amount_usd": amount_usd,
            "external_payment_id": external_payment_id,
        });
        self.send(self.client.post(&url).json(&body)).await
    }

    async fn create_order(&self, body: &Value) -> Result<Value> {
        let url = format!("{}/api/orders", self.config.backend_url);
        self.send(self.client.post(&url).json(body)).await
    }

    async fn get_order(&self, order_id: &str) -> Result<Value> {
        let url = format!("{}/api/orders/{}", self.config.backend_url, order_id);
        self.send(self.client.get(&url)).await
    }

    async fn validate_token(&self, kind: &str, token: &str) -> Result<Value> {
        let url = format!("{}/api/preconditions/validate", self.config.backend_url);
        let body = json!({ "kind": kind, "token": token });
        self.send(self.client.post(&url).json(&body)).await
    }
}

// ============================================================================
// MCP Tool Parameters
// ============================================================================

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct OrderLine {
    #[schemars(description = "Product id from list_products")]
    pub product_id: i32,

    #[schemars(description = "Number of units (positive)")]
    pub quantity: i32,

    /// Unit price quoted to the customer, as a decimal string
    #[schemars(description = "Unit price quoted to the customer, as a decimal string (e.g. '10.00'). Only needed for create_order.")]
    pub unit_price: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListProductsRequest {
    #[schemars(description = "Optional search term matched against product names")]
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CheckInventoryRequest {
    #[schemars(description = "Lines to check; quantities for the same product are added up")]
    pub items: Vec<OrderLine>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreatePaymentRequest {
    #[schemars(description = "Amount in USD as a decimal string (e.g. '20.00')")]
    pub amount_usd: String,

    #[schemars(description = "Optional id from the payment provider")]
    pub external_payment_id: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateOrderRequest {
    #[schemars(description = "Chat/user id of the customer; notifications are sent here")]
    pub customer_id: String,

    #[schemars(description = "Customer's name")]
    pub customer_name: String,

    #[schemars(description = "Verified delivery address")]
    pub delivery_address: String,

    #[schemars(description = "Optional phone number")]
    pub phone: Option<String>,

    #[schemars(description = "Order lines with unit prices")]
    pub items: Vec<OrderLine>,

    #[schemars(description = "Total the customer agreed to pay, as a decimal string")]
    pub total_amount: String,

    #[schemars(description = "Optional delivery instructions from the customer")]
    pub notes: Option<String>,

    #[schemars(description = "LOC_ token from location verification (valid 24 hours)")]
    pub location_token: String,

    #[schemars(description = "INV_ token from check_inventory (valid 60 minutes)")]
    pub inventory_token: String,

    #[schemars(description = "TXN_ token from payment verification (valid 120 minutes)")]
    pub payment_token: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetOrderRequest {
    #[schemars(description = "Order id returned by create_order")]
    pub order_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ValidateTokenRequest {
    #[schemars(description = "Token kind: 'location', 'inventory' or 'payment'")]
    pub kind: String,

    #[schemars(description = "Token to check")]
    pub token: String,
}

fn tool_error(context: &str, e: anyhow::Error) -> McpError {
    McpError {
        code: ErrorCode(-32603),
        message: Cow::from(format!("{}: {}", context, e)),
        data: None,
    }
}

fn pretty(value: &impl Serialize) -> CallToolResult {
    let formatted = serde_json::to_string_pretty(value).unwrap_or_default();
    CallToolResult::success(vec![Content::text(formatted)])
}

// ============================================================================
// MCP Server Implementation
// ============================================================================

#[derive(Clone)]
pub struct DeliveryMcpServer {
    client: Arc<BackendClient>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl DeliveryMcpServer {
    pub fn new(config: Config) -> Self {
        Self {
            client: Arc::new(BackendClient::new(config)),
            tool_router: Self::tool_router(),
        }
    }

    /// List orderable products
    #[tool(description = "List the products that can currently be ordered, with price and stock.")]
    async fn list_products(
        &self,
        Parameters(params): Parameters<ListProductsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut products = self
            .client
            .list_products()
            .await
            .map_err(|e| tool_error("Failed to list products", e))?;

        if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let search_lower = search.to_lowercase();
            products.retain(|p| p.name.to_lowercase().contains(&search_lower));
        }

        Ok(pretty(&products))
    }

    /// Check availability and obtain an INV_ token
    #[tool(description = "Check that every line can be fulfilled. When all lines are available the response carries a reservation_token (INV_...) to pass to create_order within 60 minutes.")]
    async fn check_inventory(
        &self,
        Parameters(params): Parameters<CheckInventoryRequest>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .client
            .check_inventory(&params.items)
            .await
            .map_err(|e| tool_error("Inventory check failed", e))?;
        Ok(pretty(&result))
    }

    /// Open a payment invoice and obtain a TXN_ token
    #[tool(description = "Open a payment invoice for the order total. The transaction_id (TXN_...) is the payment token for create_order.")]
    async fn create_payment(
        &self,
        Parameters(params): Parameters<CreatePaymentRequest>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .client
            .create_payment(&params.amount_usd, params.external_payment_id.as_deref())
            .await
            .map_err(|e| tool_error("Failed to create payment", e))?;
        Ok(pretty(&result))
    }

    /// Place an order
    #[tool(description = "Place an order. Requires fresh location, inventory and payment tokens. Prices are taken from the catalog; the total must match within one cent.")]
    async fn create_order(
        &self,
        Parameters(params): Parameters<CreateOrderRequest>,
    ) -> Result<CallToolResult, McpError> {
        let items: Vec<Value> = params
            .items
            .iter()
            .map(|i| {
                json!({
                    "product_id": i.product_id,
                    "quantity": i.quantity,
                    "unit_price": i.unit_price.as_deref().unwrap_or("0"),
                })
            })
            .collect();

        let body = json!({
            "customer_id": params.customer_id,
            "customer_name": params.customer_name,
            "delivery_address": params.delivery_address,
            "phone": params.phone,
            "items": items,
            "total_amount": params.total_amount,
            "notes": params.notes,
            "location_token": params.location_token,
            "inventory_token": params.inventory_token,
            "payment_token": params.payment_token,
        });

        let order = self
            .client
            .create_order(&body)
            .await
            .map_err(|e| tool_error("Failed to create order", e))?;

        info!(order_id = %order["id"], "Order placed via MCP");
        Ok(pretty(&order))
    }

    /// Look up an order
    #[tool(description = "Get an order with its items, status, payment status and note history.")]
    async fn get_order(
        &self,
        Parameters(params): Parameters<GetOrderRequest>,
    ) -> Result<CallToolResult, McpError> {
        let order = self
            .client
            .get_order(&params.order_id)
            .await
            .map_err(|e| tool_error("Failed to get order", e))?;
        Ok(pretty(&order))
    }

    /// Check a precondition token
    #[tool(description = "Check whether a precondition token is well formed and still fresh before placing an order.")]
    async fn validate_token(
        &self,
        Parameters(params): Parameters<ValidateTokenRequest>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .client
            .validate_token(&params.kind, &params.token)
            .await
            .map_err(|e| tool_error("Failed to validate token", e))?;
        Ok(pretty(&result))
    }
}

#[tool_handler]
impl ServerHandler for DeliveryMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Delivery Orders MCP Server lets you take food/grocery delivery orders for a customer.\n\n\
                WORKFLOW:\n\
                1. Use list_products to show the menu\n\
                2. Verify the delivery address with your location tool (LOC_ token)\n\
                3. Use check_inventory to confirm availability (INV_ token)\n\
                4. Use create_payment and have the customer pay (TXN_ token)\n\
                5. Use create_order with all three tokens\n\n\
                TOOLS:\n\
                - list_products: Browse orderable products\n\
                - check_inventory: Availability and reservation token\n\
                - create_payment: Open an invoice, returns the payment token\n\
                - create_order: Place the order\n\
                - get_order: Order status and history\n\
                - validate_token: Check a token before ordering"
                    .to_string(),
            ),
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to stderr (stdout is used for MCP protocol)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("delivery_mcp_server=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Delivery Orders MCP Server");

    let config = Config::from_env()?;
    info!("Backend URL: {}", config.backend_url);

    let server = DeliveryMcpServer::new(config);
    let service = server.serve(stdio()).await?;
    let quit_reason = service.waiting().await?;

    info!("Server stopped: {:?}", quit_reason);

    Ok(())
}
