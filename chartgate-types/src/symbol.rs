/// Vendor-supplied metadata describing how to interpret a symbol's prices.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SymbolMetadata {
    /// Full vendor-qualified symbol id, e.g. `"NSE:RELIANCE"`.
    pub qualified_symbol: String,
    pub tick_size: f64,
    pub price_scale: u32,
    pub minimum_move: f64,
}
