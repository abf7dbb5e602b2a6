//! Sale price computation and stock quantization.

use crate::models::PricingSettings;

/// Compute the per-SKU sale price in JPY.
///
/// `unit_price_cny` is the matched inventory entry's unit price (falling back
/// to the origin wholesale price upstream of this call). The landed cost is
/// the converted unit price with a 5% buying fee, international shipping by
/// weight, and the size-tiered domestic shipping cost. Margin and commission
/// are taken as a share of the final price, so the cost is grossed up by
/// `100 / (100 - margin - commission)` and the result rounded to the nearest
/// 10 yen.
///
/// A missing or non-positive weight makes the price incomputable: the price
/// becomes `"0"` and a warning is logged.
pub fn compute_standard_price(
    unit_price_cny: f64,
    weight_kg: Option<f64>,
    size: Option<i32>,
    settings: &PricingSettings,
) -> String {
    let cost = match landed_cost(unit_price_cny, weight_kg, size, settings) {
        Some(cost) => cost,
        None => {
            tracing::warn!(
                unit_price_cny,
                "weight missing or non-positive, price set to 0"
            );
            return "0".to_string();
        }
    };

    let denominator =
        (100.0 - (settings.profit_margin_percent + settings.sales_commission_percent)).max(1.0);
    let price = (cost * 100.0 / denominator / 10.0).round() * 10.0;

    let price = if price.is_finite() && price > 0.0 {
        price as i64
    } else {
        0
    };
    price.to_string()
}

/// Landed cost of one unit in JPY: converted unit price with the 5% buying
/// fee, weight-based international shipping, and domestic shipping for the
/// parcel size. `None` when the weight is missing or non-positive.
pub fn landed_cost(
    unit_price_cny: f64,
    weight_kg: Option<f64>,
    size: Option<i32>,
    settings: &PricingSettings,
) -> Option<f64> {
    let weight = weight_kg.filter(|w| *w > 0.0)?;
    let fx = settings.exchange_rate;
    let domestic_shipping = settings.shipping_cost_for_size(size);
    let international_shipping = settings.international_shipping_rate * weight * fx;
    Some(unit_price_cny * fx * 1.05 + international_shipping + domestic_shipping)
}

/// Map an upstream amount-on-sale figure to the stocked quantity.
///
/// Historical table, preserved verbatim: the two upper bands both map to 100
/// and the two lower bands both map to 0.
pub fn quantize_stock(amount_on_sale: i64) -> i64 {
    if amount_on_sale >= 1000 {
        100
    } else if amount_on_sale >= 500 {
        100
    } else if amount_on_sale >= 50 {
        0
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DomesticShippingCosts;

    fn settings() -> PricingSettings {
        PricingSettings {
            exchange_rate: 22.0,
            profit_margin_percent: 1.5,
            sales_commission_percent: 10.0,
            currency: "JPY".to_string(),
            domestic_shipping_costs: DomesticShippingCosts {
                regular: 300.0,
                size60: 430.0,
                size80: 420.0,
                size100: 480.0,
            },
            international_shipping_rate: 19.2,
            customs_duty_rate: 100.0,
        }
    }

    #[test]
    fn test_price_for_size60_parcel() {
        // 10*22*1.05 + 19.2*0.5*22 + 430 = 872.2; grossed up by 100/88.5 and
        // rounded to the nearest 10 -> 990
        let price = compute_standard_price(10.0, Some(0.5), Some(60), &settings());
        assert_eq!(price, "990");
    }

    #[test]
    fn test_price_is_always_multiple_of_ten() {
        let s = settings();
        for (cny, w) in [(1.0, 0.1), (8.0, 0.5), (123.4, 2.3), (999.0, 10.0)] {
            let price: i64 = compute_standard_price(cny, Some(w), Some(60), &s)
                .parse()
                .unwrap();
            assert_eq!(price % 10, 0);
            assert!(price >= 0);
        }
    }

    #[test]
    fn test_missing_weight_yields_zero() {
        assert_eq!(compute_standard_price(10.0, None, Some(60), &settings()), "0");
        assert_eq!(
            compute_standard_price(10.0, Some(0.0), Some(60), &settings()),
            "0"
        );
        assert_eq!(
            compute_standard_price(10.0, Some(-1.0), Some(60), &settings()),
            "0"
        );
    }

    #[test]
    fn test_unknown_size_falls_back_to_regular_shipping() {
        let s = settings();
        let with_regular = compute_standard_price(10.0, Some(0.5), None, &s);
        let with_odd_size = compute_standard_price(10.0, Some(0.5), Some(45), &s);
        assert_eq!(with_regular, with_odd_size);
    }

    #[test]
    fn test_degenerate_margin_is_clamped() {
        let mut s = settings();
        s.profit_margin_percent = 60.0;
        s.sales_commission_percent = 50.0;
        let price: i64 = compute_standard_price(10.0, Some(0.5), Some(60), &s)
            .parse()
            .unwrap();
        assert!(price > 0);
    }

    #[test]
    fn test_landed_cost_components() {
        let cost = landed_cost(10.0, Some(0.5), Some(60), &settings()).unwrap();
        assert!((cost - 872.2).abs() < 1e-9);
        assert_eq!(landed_cost(10.0, None, Some(60), &settings()), None);
    }

    #[test]
    fn test_quantize_stock_table() {
        assert_eq!(quantize_stock(5000), 100);
        assert_eq!(quantize_stock(1000), 100);
        assert_eq!(quantize_stock(999), 100);
        assert_eq!(quantize_stock(500), 100);
        assert_eq!(quantize_stock(499), 0);
        assert_eq!(quantize_stock(50), 0);
        assert_eq!(quantize_stock(49), 0);
        assert_eq!(quantize_stock(0), 0);
    }
}
