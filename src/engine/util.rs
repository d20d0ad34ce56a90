/// Extracts the numeric part of a global ID.
///
/// `gid://shopify/Product/8737842954464` becomes `8737842954464`.
pub fn extract_numeric_id(gid: &str) -> &str {
    gid.rsplit('/').next().unwrap_or(gid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_trailing_segment() {
        assert_eq!(extract_numeric_id("gid://shopify/Product/8737842954464"), "8737842954464");
        assert_eq!(extract_numeric_id("gid://shopify/Customer/42"), "42");
        assert_eq!(extract_numeric_id("42"), "42");
    }
}
