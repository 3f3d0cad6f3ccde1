//! PIX BR Code (EMV QRCPS) payloads and QR rendering.

use base64::{engine::general_purpose::STANDARD, Engine};
use qrcode::render::svg;
use qrcode::QrCode;

use super::types::BillingError;

const GUI: &str = "br.gov.bcb.pix";
const MAX_NAME: usize = 25;
const MAX_CITY: usize = 15;
const MAX_TXID: usize = 25;

/// Inputs of a static PIX payload.
#[derive(Debug, Clone)]
pub struct PixParams<'a> {
    pub key: &'a str,
    pub merchant_name: &'a str,
    pub merchant_city: &'a str,
    pub amount_cents: i64,
    pub txid: &'a str,
}

/// CRC16/CCITT-FALSE (poly 0x1021, init 0xFFFF).
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

fn field(id: &str, value: &str) -> String {
    format!("{}{:02}{}", id, value.len(), value)
}

/// Fold to the ASCII subset PIX readers accept.
fn sanitize(value: &str, max: usize) -> String {
    value
        .chars()
        .filter_map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => Some('a'),
            'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => Some('A'),
            'é' | 'è' | 'ê' | 'ë' => Some('e'),
            'É' | 'È' | 'Ê' | 'Ë' => Some('E'),
            'í' | 'ì' | 'î' | 'ï' => Some('i'),
            'Í' | 'Ì' | 'Î' | 'Ï' => Some('I'),
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => Some('o'),
            'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => Some('O'),
            'ú' | 'ù' | 'û' | 'ü' => Some('u'),
            'Ú' | 'Ù' | 'Û' | 'Ü' => Some('U'),
            'ç' => Some('c'),
            'Ç' => Some('C'),
            c if c.is_ascii_alphanumeric() || c == ' ' || c == '.' || c == '-' => Some(c),
            _ => None,
        })
        .take(max)
        .collect()
}

/// Build a static BR Code payload with its trailing CRC.
pub fn build_br_code(params: &PixParams<'_>) -> String {
    let account = format!("{}{}", field("00", GUI), field("01", params.key));
    let amount = format!("{}.{:02}", params.amount_cents / 100, params.amount_cents % 100);

    let mut txid: String = params
        .txid
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(MAX_TXID)
        .collect();
    if txid.is_empty() {
        txid = "***".to_string();
    }

    let mut payload = String::new();
    payload.push_str(&field("00", "01"));
    payload.push_str(&field("26", &account));
    payload.push_str(&field("52", "0000"));
    payload.push_str(&field("53", "986"));
    payload.push_str(&field("54", &amount));
    payload.push_str(&field("58", "BR"));
    payload.push_str(&field("59", &sanitize(params.merchant_name, MAX_NAME)));
    payload.push_str(&field("60", &sanitize(params.merchant_city, MAX_CITY)));
    payload.push_str(&field("62", &field("05", &txid)));
    payload.push_str("6304");

    let crc = crc16_ccitt(payload.as_bytes());
    payload.push_str(&format!("{:04X}", crc));
    payload
}

/// Render a payload as an SVG QR code data URI.
pub fn qr_svg_data_uri(payload: &str) -> Result<String, BillingError> {
    let code = QrCode::new(payload.as_bytes()).map_err(|e| BillingError::QrError(e.to_string()))?;
    let image = code
        .render::<svg::Color>()
        .min_dimensions(256, 256)
        .quiet_zone(true)
        .build();
    Ok(format!("data:image/svg+xml;base64,{}", STANDARD.encode(image)))
}
