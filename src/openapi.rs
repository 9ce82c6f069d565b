use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        description = "Multi-tenant storefront checkout and payment settlement"
    ),
    paths(
        crate::handlers::orders::checkout,
        crate::handlers::orders::list_orders,
        crate::handlers::webhooks::abacatepay_webhook,
    ),
    components(schemas(
        crate::services::checkout::CheckoutRequest,
        crate::services::checkout::CheckoutItem,
        crate::services::checkout::DeliveryAddress,
        crate::services::checkout::CheckoutResponse,
        crate::services::checkout::PaymentLink,
        crate::services::orders::OrderView,
        crate::services::orders::OrderItemView,
        crate::services::orders::DeliveryView,
        crate::entities::order::OrderStatus,
        crate::errors::ErrorResponse,
    )),
    tags(
        (name = "Orders", description = "Checkout and order history"),
        (name = "Webhooks", description = "Payment provider callbacks")
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
