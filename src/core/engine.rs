use super::types::{ChartPoint, Params, Projection};

/// Projects a lump sum plus monthly contributions over the investment period
/// and reports nominal, after-tax and inflation-adjusted outcomes together
/// with a per-year series for charting.
///
/// The whole computation is in f64 and carries unrounded balances between
/// years; rounding to whole currency units happens only when a value is
/// written into the result.
pub fn project(params: &Params) -> Projection {
    let monthly_rate = params.annual_return / 100.0 / 12.0;
    let annual_inflation = params.inflation_rate / 100.0;
    let tax_rate = params.tax_type.gains_tax_rate();

    let mut balance = params.lump_sum;
    let mut principal = params.lump_sum;

    let mut chart_data = Vec::with_capacity(params.investment_period as usize + 1);
    chart_data.push(ChartPoint {
        year: 0,
        nominal_value: params.lump_sum,
        real_value: params.lump_sum,
        principal: params.lump_sum,
    });

    for year in 1..=params.investment_period {
        // The contribution is flat within a year. With inflation adjustment on
        // it steps up once per year, scaled by cumulative inflation since
        // year 1; year 1 always contributes the nominal monthly deposit.
        let monthly_contribution = if params.adjust_deposit_for_inflation {
            params.monthly_deposit * (1.0 + annual_inflation).powi(year as i32 - 1)
        } else {
            params.monthly_deposit
        };

        for _month in 0..12 {
            // Deposit at the start of the month, interest on the whole balance
            // at the end of it. This order matches the reference compounding
            // convention; do not swap it.
            balance += monthly_contribution;
            balance *= 1.0 + monthly_rate;
            principal += monthly_contribution;
        }

        // Real value discounts the cumulative balance by cumulative inflation
        // since time 0, not by a single year's delta.
        let real_value = balance / (1.0 + annual_inflation).powi(year as i32);

        chart_data.push(ChartPoint {
            year,
            nominal_value: balance.round(),
            real_value: real_value.round(),
            principal: principal.round(),
        });
    }

    // Tax hits realized gains only. Losses are never taxed and never produce
    // a rebate.
    let profit = balance - principal;
    let tax = if profit > 0.0 { profit * tax_rate } else { 0.0 };
    let after_tax_nominal_value = balance - tax;

    let real_purchasing_power =
        after_tax_nominal_value / (1.0 + annual_inflation).powi(params.investment_period as i32);

    // Sustainable withdrawal is driven by the real rate of return. A
    // non-positive real rate means no withdrawal preserves purchasing power,
    // so both usable amounts are reported as zero; spending down principal is
    // not modeled.
    let real_rate = (1.0 + params.annual_return / 100.0) / (1.0 + annual_inflation) - 1.0;
    let yearly_usable_real = if real_rate > 0.0 {
        real_purchasing_power * real_rate
    } else {
        0.0
    };
    let monthly_usable_real = yearly_usable_real / 12.0;

    Projection {
        total_principal: principal.round(),
        nominal_future_value: balance.round(),
        after_tax_nominal_value: after_tax_nominal_value.round(),
        real_purchasing_power: real_purchasing_power.round(),
        yearly_usable_real: yearly_usable_real.round(),
        monthly_usable_real: monthly_usable_real.round(),
        chart_data,
    }
}
