use serde::Serialize;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TaxType {
    TaxFree,
    General,
}

impl TaxType {
    /// Flat rate applied to realized gains at the end of the horizon:
    /// 15.4% for a general taxable account, nothing for tax-exempt wrappers.
    pub fn gains_tax_rate(self) -> f64 {
        match self {
            TaxType::TaxFree => 0.0,
            TaxType::General => 0.154,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Params {
    pub lump_sum: f64,
    pub monthly_deposit: f64,
    pub adjust_deposit_for_inflation: bool,
    pub annual_return: f64,
    pub investment_period: u32,
    pub inflation_rate: f64,
    pub tax_type: TaxType,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub year: u32,
    pub nominal_value: f64,
    pub real_value: f64,
    pub principal: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub total_principal: f64,
    pub nominal_future_value: f64,
    pub after_tax_nominal_value: f64,
    pub real_purchasing_power: f64,
    pub yearly_usable_real: f64,
    pub monthly_usable_real: f64,
    pub chart_data: Vec<ChartPoint>,
}
