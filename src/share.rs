use crate::error::ShareError;
use crate::schemas::Bill;

/// Packs a bill into a short string made of URI-safe characters, compressed with LZ-string.
pub fn encode_bill(bill: &Bill) -> Result<String, ShareError> {
    let json = serde_json::to_string(bill)?;
    Ok(lz_str::compress_to_encoded_uri_component(json.as_str()))
}

pub fn decode_bill(encoded: &str) -> Result<Bill, ShareError> {
    // Query parsing turns `+` into a space.
    let encoded = encoded.trim().replace(' ', "+");
    if encoded.is_empty() {
        return Err(ShareError::Encoding);
    }
    let wide = lz_str::decompress_from_encoded_uri_component(encoded.as_str())
        .filter(|wide| !wide.is_empty())
        .ok_or(ShareError::Encoding)?;
    let json = String::from_utf16(&wide).map_err(|_| ShareError::Encoding)?;
    let bill: Bill = serde_json::from_str(&json)?;
    if bill.id.is_empty() || bill.name.is_empty() {
        return Err(ShareError::Incomplete);
    }
    Ok(bill)
}

pub fn generate_share_url(base_url: &str, bill: &Bill) -> Result<String, ShareError> {
    let encoded = encode_bill(bill)?;
    Ok(format!("{base_url}?data={}", urlencoding::encode(&encoded)))
}
