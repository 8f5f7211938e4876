//! Strategies shipped with the `qk` binary.

use qk_md::DataSlice;
use qk_schemas::Symbol;
use qk_strategy::{
    DateRule, ScheduleRule, Strategy, StrategyContext, StrategyMeta, StrategyRegistry, StrategyResult, StrategySpec,
    TimeRule,
};

/// Knobs shared by the builtin strategies.
#[derive(Clone, Debug)]
pub struct StrategyParams {
    pub symbol: Symbol,
    pub quantity: i64,
}

pub fn builtin_registry(params: &StrategyParams) -> anyhow::Result<StrategyRegistry> {
    let mut reg = StrategyRegistry::new();

    reg.register(
        StrategyMeta::new("noop", "1.0.0", "subscribes and does nothing"),
        || Box::new(NoOp) as Box<dyn Strategy>,
    )?;

    let p = params.clone();
    reg.register(
        StrategyMeta::new("buy-and-hold", "1.0.0", "market buy on the first print, then hold"),
        move || Box::new(BuyAndHold::new(p.clone())) as Box<dyn Strategy>,
    )?;

    let p = params.clone();
    reg.register(
        StrategyMeta::new(
            "moo-daily",
            "1.0.0",
            "market-on-open buy each trading day, submitted an hour before the close",
        ),
        move || Box::new(MooDaily::new(p.clone())) as Box<dyn Strategy>,
    )?;

    Ok(reg)
}

struct NoOp;

impl Strategy for NoOp {
    fn spec(&self) -> StrategySpec {
        StrategySpec::new("noop")
    }
}

struct BuyAndHold {
    params: StrategyParams,
    invested: bool,
}

impl BuyAndHold {
    fn new(params: StrategyParams) -> Self {
        Self {
            params,
            invested: false,
        }
    }
}

impl Strategy for BuyAndHold {
    fn spec(&self) -> StrategySpec {
        StrategySpec::new("buy-and-hold")
    }

    fn initialize(&mut self, ctx: &mut StrategyContext<'_>) -> StrategyResult {
        ctx.add_instrument(&self.params.symbol)?;
        Ok(())
    }

    fn on_data(&mut self, ctx: &mut StrategyContext<'_>, slice: &DataSlice) -> StrategyResult {
        if !self.invested && slice.contains(&self.params.symbol) {
            ctx.buy(&self.params.symbol, self.params.quantity)?;
            self.invested = true;
        }
        Ok(())
    }
}

struct MooDaily {
    params: StrategyParams,
}

impl MooDaily {
    fn new(params: StrategyParams) -> Self {
        Self { params }
    }
}

impl Strategy for MooDaily {
    fn spec(&self) -> StrategySpec {
        StrategySpec::new("moo-daily")
    }

    fn initialize(&mut self, ctx: &mut StrategyContext<'_>) -> StrategyResult {
        ctx.add_instrument(&self.params.symbol)?;
        ctx.schedule_named(
            ScheduleRule::new(DateRule::EveryTradingDay, TimeRule::BeforeMarketClose(60)),
            "moo",
        );
        Ok(())
    }

    fn on_scheduled(&mut self, ctx: &mut StrategyContext<'_>, _name: &str) -> StrategyResult {
        ctx.market_on_open_order(&self.params.symbol, self.params.quantity)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lists_builtins_in_order() {
        let reg = builtin_registry(&StrategyParams {
            symbol: Symbol::equity("SPY"),
            quantity: 10,
        })
        .unwrap();
        let names: Vec<&str> = reg.list().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["noop", "buy-and-hold", "moo-daily"]);
        assert_eq!(reg.instantiate("moo-daily").unwrap().spec().name, "moo-daily");
    }
}
