//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{health, items, loans};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Inventory Loans API",
        version = "1.0.0",
        description = "Equipment loan lifecycle and stock reconciliation REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Items
        items::list_items,
        items::get_item,
        items::create_item,
        items::resize_stock,
        // Loans
        loans::list_loans,
        loans::create_loan,
        loans::get_loan,
        loans::approve_loan,
        loans::reject_loan,
        loans::return_loan,
        loans::delay_loan,
        loans::delete_loan,
    ),
    components(
        schemas(
            // Items
            crate::models::item::Item,
            crate::models::item::ItemStatus,
            crate::models::item::ItemQuery,
            crate::models::item::CreateItem,
            crate::models::item::ResizeStock,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::LoanState,
            crate::models::loan::LoanQuery,
            crate::models::loan::CreateLoan,
            crate::models::loan::ApproveLoan,
            crate::models::loan::DelayLoan,
            // Users
            crate::models::user::Role,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "items", description = "Inventory item management"),
        (name = "loans", description = "Loan lifecycle")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
