use chrono::{DateTime, Utc};
use common::domain::{Gateway, MailMessage};

/// Detail page for a gateway on the fleet frontend
pub fn gateway_detail_url(frontend_base_url: &str, gateway_id: &str) -> String {
    format!(
        "{}/gateways/gateway-detail/{}",
        frontend_base_url.trim_end_matches('/'),
        gateway_id
    )
}

/// Notification for a gateway that crossed its offline threshold
pub fn offline_mail(to: &str, gateway: &Gateway, frontend_base_url: &str) -> MailMessage {
    let url = gateway_detail_url(frontend_base_url, &gateway.gateway_id);
    MailMessage {
        to: to.to_string(),
        subject: format!("LoRaFleet alarm: {} is offline", gateway.name),
        html_body: format!(
            "<p>LoRaFleet alarm</p>\
             <p>Gateway {} is offline.</p>\
             <p>No further notice is sent until the gateway comes back online.</p>\
             <p>Link: <a href=\"{url}\">{url}</a></p>",
            gateway.name,
        ),
    }
}

/// Notification for a latched gateway that reported again
pub fn back_online_mail(
    to: &str,
    gateway: &Gateway,
    seen_at: DateTime<Utc>,
    frontend_base_url: &str,
) -> MailMessage {
    let url = gateway_detail_url(frontend_base_url, &gateway.gateway_id);
    MailMessage {
        to: to.to_string(),
        subject: format!("LoRaFleet alarm: {} is back online", gateway.name),
        html_body: format!(
            "<p>LoRaFleet alarm</p>\
             <p>Gateway {} came back online at {}.</p>\
             <p>A new notice is sent if the gateway goes offline again.</p>\
             <p>Link: <a href=\"{url}\">{url}</a></p>",
            gateway.name,
            seen_at.to_rfc3339(),
        ),
    }
}

/// Notification for a daily packet count outside the configured range
pub fn unusual_traffic_mail(
    to: &str,
    gateway: &Gateway,
    received_packages: i64,
    minimum: i64,
    maximum: i64,
    frontend_base_url: &str,
) -> MailMessage {
    let url = gateway_detail_url(frontend_base_url, &gateway.gateway_id);
    MailMessage {
        to: to.to_string(),
        subject: format!("LoRaFleet alarm: {} has an unusual packet pattern", gateway.name),
        html_body: format!(
            "<p>LoRaFleet alarm</p>\
             <p>Gateway {} has an unusual packet pattern.</p>\
             <p>Packets received over the last day: {} (expected between {} and {}).</p>\
             <p>A notice is sent every day until the pattern is back in range.</p>\
             <p>Link: <a href=\"{url}\">{url}</a></p>",
            gateway.name, received_packages, minimum, maximum,
        ),
    }
}
