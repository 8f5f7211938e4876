/// JSON-pointer prefixes `qk backtest` actually reads.
///
/// Keep in step with the sections qk-cli deserializes.
pub fn consumed_pointers() -> &'static [&'static str] {
    CONSUMED
}

static CONSUMED: &[&str] = &[
    "/backtest",
    "/universe/symbols",
    "/strategy/name",
    "/strategy/symbol",
    "/strategy/quantity",
    "/data/prices",
];
