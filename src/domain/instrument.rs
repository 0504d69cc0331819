//! Tradable instrument definition and quantity normalisation.

#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub symbol: String,
    pub price_increment: f64,
    pub size_increment: f64,
    pub min_quantity: f64,
    pub min_notional: f64,
    pub maker_fee: f64,
    pub taker_fee: f64,
    pub margin_init: f64,
}

impl Instrument {
    /// Binance ETHUSDT linear perpetual.
    pub fn ethusdt_perpetual() -> Self {
        Instrument {
            symbol: "ETHUSDT.P".to_string(),
            price_increment: 0.01,
            size_increment: 0.001,
            min_quantity: 0.001,
            min_notional: 5.0,
            maker_fee: 0.0002,
            taker_fee: 0.0005,
            margin_init: 0.05,
        }
    }

    /// Leverage implied by the initial margin requirement.
    pub fn max_leverage(&self) -> f64 {
        if self.margin_init > 0.0 {
            1.0 / self.margin_init
        } else {
            1.0
        }
    }

    /// Rounds a quantity down to the nearest multiple of the size increment.
    pub fn normalize_quantity(&self, quantity: f64) -> f64 {
        floor_to_increment(quantity, self.size_increment)
    }

    /// Rounds a price to the nearest multiple of the price increment.
    pub fn normalize_price(&self, price: f64) -> f64 {
        if self.price_increment <= 0.0 {
            return price;
        }
        let decimals = increment_decimals(self.price_increment);
        round_to(
            (price / self.price_increment).round() * self.price_increment,
            decimals,
        )
    }
}

impl Default for Instrument {
    fn default() -> Self {
        Instrument::ethusdt_perpetual()
    }
}

fn floor_to_increment(value: f64, increment: f64) -> f64 {
    if increment <= 0.0 {
        return value;
    }
    let decimals = increment_decimals(increment);
    // Tolerate representation error: 0.3 / 0.1 must count as 3 steps, not 2.
    let steps = (value / increment + 1e-9).floor();
    round_to(steps * increment, decimals)
}

fn increment_decimals(increment: f64) -> i32 {
    let mut decimals = 0;
    let mut scaled = increment;
    while decimals < 12 && (scaled - scaled.round()).abs() > 1e-9 {
        scaled *= 10.0;
        decimals += 1;
    }
    decimals
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
