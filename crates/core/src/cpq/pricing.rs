use rust_decimal::Decimal;

use crate::cpq::{in_range, round_total, round_unit};
use crate::domain::quote::{LineBreakdown, LineInput, QuoteLine};
use crate::errors::CoreError;

/// Prices one line.
///
/// Landed cost is `buy × (1 + freight) × exchange × (1 + duty) × (1 + handling)`.
/// Unit-level fields are rounded half-up to 4 places as they are produced and
/// totals to 2 places, so each later step works from the rounded value
/// before it. A step that leaves the `Decimal` range fails with
/// `InvalidInput` naming the field that drove it.
pub fn calculate_line(input: &LineInput, vat_rate: Decimal) -> Result<QuoteLine, CoreError> {
    let buy_price = validate(input, vat_rate)?;
    let exchange_rate = input.exchange_rate;

    let freight_multiplier = in_range(Decimal::ONE.checked_add(input.freight_rate), "freight_rate")?;
    let duty_multiplier = in_range(Decimal::ONE.checked_add(input.duty_rate), "duty_rate")?;
    let handling_multiplier =
        in_range(Decimal::ONE.checked_add(input.handling_rate), "handling_rate")?;
    let converted = in_range(buy_price.checked_mul(exchange_rate), "buy_price")?;
    let landed_cost = round_unit(in_range(
        converted
            .checked_mul(freight_multiplier)
            .and_then(|value| value.checked_mul(duty_multiplier))
            .and_then(|value| value.checked_mul(handling_multiplier)),
        "buy_price",
    )?);

    let duty_amount = round_unit(in_range(converted.checked_mul(input.duty_rate), "duty_rate")?);
    let handling_amount =
        round_unit(in_range(converted.checked_mul(input.handling_rate), "handling_rate")?);
    let freight_amount =
        round_unit(in_range(buy_price.checked_mul(input.freight_rate), "freight_rate")?);

    let (markup_field, markup_percent) = match input.override_markup_percent {
        Some(markup) => ("override_markup_percent", round_unit(markup)),
        None => ("target_markup_percent", round_unit(input.target_markup_percent)),
    };
    let markup_amount = round_unit(in_range(landed_cost.checked_mul(markup_percent), markup_field)?);
    let unit_sell_ex_vat =
        round_unit(in_range(landed_cost.checked_add(markup_amount), markup_field)?);

    let line_total_ex_vat = round_total(in_range(
        unit_sell_ex_vat.checked_mul(Decimal::from(input.quantity)),
        "quantity",
    )?);
    let vat_amount = round_total(in_range(line_total_ex_vat.checked_mul(vat_rate), "vat_rate")?);
    let line_total_inc_vat =
        round_total(in_range(line_total_ex_vat.checked_add(vat_amount), "vat_rate")?);

    Ok(QuoteLine::from_parts(
        input.clone(),
        LineBreakdown {
            vat_rate,
            markup_percent,
            freight_amount,
            duty_amount,
            handling_amount,
            landed_cost,
            markup_amount,
            unit_sell_ex_vat,
            line_total_ex_vat,
            vat_amount,
            line_total_inc_vat,
        },
    ))
}

/// Prices a batch of lines. The first invalid line aborts the whole batch
/// and the error carries its index.
pub fn calculate_lines(inputs: &[LineInput], vat_rate: Decimal) -> Result<Vec<QuoteLine>, CoreError> {
    inputs
        .iter()
        .enumerate()
        .map(|(index, input)| calculate_line(input, vat_rate).map_err(|error| error.at_line(index)))
        .collect()
}

fn validate(input: &LineInput, vat_rate: Decimal) -> Result<Decimal, CoreError> {
    let Some(buy_price) = input.buy_price else {
        return Err(CoreError::invalid_input("buy_price", "is required"));
    };
    if buy_price < Decimal::ZERO {
        return Err(CoreError::invalid_input("buy_price", "must not be negative"));
    }

    let currency = input.currency.trim();
    if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_alphabetic()) {
        return Err(CoreError::invalid_input(
            "currency",
            format!("`{}` is not a three-letter currency code", input.currency),
        ));
    }

    if input.quantity < 1 {
        return Err(CoreError::invalid_input("quantity", "must be at least 1"));
    }

    if input.exchange_rate <= Decimal::ZERO {
        return Err(CoreError::invalid_input("exchange_rate", "must be greater than zero"));
    }

    for (field, rate) in [
        ("freight_rate", input.freight_rate),
        ("duty_rate", input.duty_rate),
        ("handling_rate", input.handling_rate),
    ] {
        if rate < Decimal::ZERO {
            return Err(CoreError::invalid_input(field, "must not be negative"));
        }
    }

    if vat_rate < Decimal::ZERO {
        return Err(CoreError::invalid_input("vat_rate", "must not be negative"));
    }

    Ok(buy_price)
}
