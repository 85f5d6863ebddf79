//! Quota tables of known API groups.
//!
//! Each client of the fulfillment API builds its own registry from the table of
//! the API group it talks to; the numbers are the published burst sizes and
//! restore rates (requests per second) of the remote service.

use crate::registry::ActionConfig;

pub mod fba_inbound {
    pub const CREATE_INBOUND_SHIPMENT_PLAN: &str = "createInboundShipmentPlan";
    pub const CREATE_INBOUND_SHIPMENT: &str = "createInboundShipment";
    pub const UPDATE_INBOUND_SHIPMENT: &str = "updateInboundShipment";
    pub const LIST_INBOUND_SHIPMENTS: &str = "listInboundShipments";
    pub const LIST_INBOUND_SHIPMENTS_BY_NEXT_TOKEN: &str = "listInboundShipmentsByNextToken";
    pub const LIST_INBOUND_SHIPMENT_ITEMS: &str = "listInboundShipmentItems";
    pub const LIST_INBOUND_SHIPMENT_ITEMS_BY_NEXT_TOKEN: &str =
        "listInboundShipmentItemsByNextToken";
    pub const GET_INBOUND_GUIDANCE_FOR_SKU: &str = "getInboundGuidanceForSKU";
    pub const GET_INBOUND_GUIDANCE_FOR_ASIN: &str = "getInboundGuidanceForASIN";
    pub const PUT_TRANSPORT_CONTENT: &str = "putTransportContent";
    pub const GET_TRANSPORT_CONTENT: &str = "getTransportContent";
    pub const GET_PACKAGE_LABELS: &str = "getPackageLabels";
    pub const GET_UNIQUE_PACKAGE_LABELS: &str = "getUniquePackageLabels";
}

/// Inbound shipment API group.
pub fn fba_inbound() -> Vec<ActionConfig> {
    use fba_inbound::*;

    vec![
        ActionConfig::standalone(CREATE_INBOUND_SHIPMENT_PLAN, 30.0, 2.0),
        ActionConfig::standalone(CREATE_INBOUND_SHIPMENT, 30.0, 2.0),
        ActionConfig::standalone(UPDATE_INBOUND_SHIPMENT, 30.0, 2.0),
        ActionConfig::standalone(LIST_INBOUND_SHIPMENTS, 30.0, 2.0),
        ActionConfig::alias(LIST_INBOUND_SHIPMENTS_BY_NEXT_TOKEN, LIST_INBOUND_SHIPMENTS),
        ActionConfig::standalone(LIST_INBOUND_SHIPMENT_ITEMS, 30.0, 2.0),
        ActionConfig::alias(
            LIST_INBOUND_SHIPMENT_ITEMS_BY_NEXT_TOKEN,
            LIST_INBOUND_SHIPMENT_ITEMS,
        ),
        ActionConfig::standalone(GET_INBOUND_GUIDANCE_FOR_SKU, 200.0, 200.0),
        ActionConfig::standalone(GET_INBOUND_GUIDANCE_FOR_ASIN, 200.0, 200.0),
        ActionConfig::standalone(PUT_TRANSPORT_CONTENT, 30.0, 2.0),
        ActionConfig::standalone(GET_TRANSPORT_CONTENT, 30.0, 2.0),
        ActionConfig::standalone(GET_PACKAGE_LABELS, 30.0, 2.0),
        ActionConfig::standalone(GET_UNIQUE_PACKAGE_LABELS, 30.0, 2.0),
    ]
}
