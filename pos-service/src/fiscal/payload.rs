//! Invoice transformer: maps an internal invoice record into the authority
//! wire payload.
//!
//! This is a pure function; all I/O lives in the submission client. The same
//! input always produces the same payload.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sale-type code denoting a normal (non-refund) sale.
pub const NORMAL_SALE_CODE: &str = "N";
/// Receipt-type code denoting a sale receipt.
pub const SALE_RECEIPT_CODE: &str = "S";
/// Tax-type code for standard-rated items.
pub const STANDARD_TAX_CODE: &str = "A";

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("invalid invoice: {0}")]
    Validation(String),
}

/// Tax classification derived from an item's tax-type code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxClass {
    pub category: &'static str,
    /// Percentage rate, e.g. 16 for the standard VAT rate.
    pub rate: Decimal,
}

/// Pluggable tax-code classification.
///
/// Kept as a single seam so additional authority codes can be added without
/// touching the submission logic.
pub trait TaxRule: Send + Sync {
    fn classify(&self, tax_code: &str) -> TaxClass;
}

/// Binary policy: the standard code is VAT at 16%, everything else is exempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardVatRule;

impl TaxRule for StandardVatRule {
    fn classify(&self, tax_code: &str) -> TaxClass {
        if tax_code == STANDARD_TAX_CODE {
            TaxClass {
                category: "VAT",
                rate: Decimal::from(16),
            }
        } else {
            TaxClass {
                category: "EXEMPT",
                rate: Decimal::ZERO,
            }
        }
    }
}

/// Split a VAT-inclusive line total into (taxable, tax) at the given
/// percentage rate, both rounded to 2 decimal places.
pub fn vat_breakdown(total: Decimal, rate: Decimal) -> (Decimal, Decimal) {
    if rate.is_zero() {
        return (total, Decimal::ZERO);
    }
    let divisor = Decimal::ONE + rate / Decimal::from(100);
    let tax = (total - total / divisor).round_dp(2);
    (total - tax, tax)
}

/// Internal invoice record as the pipeline sees it, before field mapping.
#[derive(Debug, Clone)]
pub struct InvoiceSource {
    pub tpin: String,
    pub bhf_id: String,
    pub device_serial: String,
    pub invoice_number: String,
    pub sale_date: NaiveDate,
    pub sale_type_code: String,
    pub receipt_type_code: String,
    pub payment_type: Option<String>,
    pub customer_tpin: Option<String>,
    pub customer_name: Option<String>,
    pub total_taxable: Decimal,
    pub total_tax: Decimal,
    pub total_amount: Decimal,
    pub items: Vec<SourceLineItem>,
}

#[derive(Debug, Clone)]
pub struct SourceLineItem {
    pub item_code: String,
    pub item_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub tax_code: String,
    pub taxable_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

/// Authority payload for `POST /trnsSales/saveSales`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiscalInvoice {
    pub tpin: String,
    pub bhf_id: String,
    pub device_serial_no: String,
    pub invc_no: String,
    pub sales_dt: String,
    pub invoice_type: String,
    pub transaction_type: String,
    pub payment_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_tpin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_nm: Option<String>,
    pub total_item_cnt: i32,
    pub items: Vec<FiscalLineItem>,
    pub tot_taxbl_amt: f64,
    pub tot_tax_amt: f64,
    pub tot_amt: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiscalLineItem {
    pub item_cd: String,
    pub item_nm: String,
    pub qty: i32,
    pub prc: f64,
    pub taxbl_amt: f64,
    pub tax_category: String,
    pub tax_rate: f64,
    pub tax_amt: f64,
    pub tot_amt: f64,
}

/// Build the authority payload from an internal invoice record.
///
/// Field mapping and derivation rules:
/// - `salesDt` is the sale date with a fixed midnight time suffix, since the
///   source record carries only a date.
/// - `invoiceType` is `NORMAL` for the normal-sale code, `REFUND` otherwise.
/// - `transactionType` is `SALE` for the sale receipt code, `REFUND` otherwise.
/// - `paymentType` defaults to `CASH` when unspecified.
/// - Per-item tax category and rate come from the supplied [`TaxRule`].
pub fn build_payload(
    src: &InvoiceSource,
    rule: &dyn TaxRule,
) -> Result<FiscalInvoice, TransformError> {
    if src.invoice_number.trim().is_empty() {
        return Err(TransformError::Validation(
            "invoice number is required".to_string(),
        ));
    }
    if src.items.is_empty() {
        return Err(TransformError::Validation(
            "invoice has no line items".to_string(),
        ));
    }
    if let Some(item) = src.items.iter().find(|i| i.quantity <= 0) {
        return Err(TransformError::Validation(format!(
            "line item {} has non-positive quantity {}",
            item.item_code, item.quantity
        )));
    }

    let invoice_type = if src.sale_type_code == NORMAL_SALE_CODE {
        "NORMAL"
    } else {
        "REFUND"
    };
    let transaction_type = if src.receipt_type_code == SALE_RECEIPT_CODE {
        "SALE"
    } else {
        "REFUND"
    };
    let payment_type = src
        .payment_type
        .clone()
        .unwrap_or_else(|| "CASH".to_string());

    let items: Vec<FiscalLineItem> = src
        .items
        .iter()
        .map(|item| {
            let class = rule.classify(&item.tax_code);
            FiscalLineItem {
                item_cd: item.item_code.clone(),
                item_nm: item.item_name.clone(),
                qty: item.quantity,
                prc: to_wire(item.unit_price),
                taxbl_amt: to_wire(item.taxable_amount),
                tax_category: class.category.to_string(),
                tax_rate: to_wire(class.rate),
                tax_amt: to_wire(item.tax_amount),
                tot_amt: to_wire(item.total_amount),
            }
        })
        .collect();

    Ok(FiscalInvoice {
        tpin: src.tpin.clone(),
        bhf_id: src.bhf_id.clone(),
        device_serial_no: src.device_serial.clone(),
        invc_no: src.invoice_number.clone(),
        sales_dt: format!("{}T00:00:00", src.sale_date.format("%Y-%m-%d")),
        invoice_type: invoice_type.to_string(),
        transaction_type: transaction_type.to_string(),
        payment_type,
        customer_tpin: src.customer_tpin.clone(),
        customer_nm: src.customer_name.clone(),
        total_item_cnt: src.items.len() as i32,
        items,
        tot_taxbl_amt: to_wire(src.total_taxable),
        tot_tax_amt: to_wire(src.total_tax),
        tot_amt: to_wire(src.total_amount),
    })
}

fn to_wire(amount: Decimal) -> f64 {
    amount.to_f64().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> InvoiceSource {
        InvoiceSource {
            tpin: "1000000000".to_string(),
            bhf_id: "000".to_string(),
            device_serial: "DEV-01".to_string(),
            invoice_number: "INV-7".to_string(),
            sale_date: NaiveDate::from_ymd_opt(2025, 9, 24).unwrap(),
            sale_type_code: NORMAL_SALE_CODE.to_string(),
            receipt_type_code: SALE_RECEIPT_CODE.to_string(),
            payment_type: None,
            customer_tpin: None,
            customer_name: None,
            total_taxable: Decimal::new(1552, 2),
            total_tax: Decimal::new(248, 2),
            total_amount: Decimal::new(1800, 2),
            items: vec![SourceLineItem {
                item_code: "P000001".to_string(),
                item_name: "Nshima".to_string(),
                quantity: 2,
                unit_price: Decimal::new(900, 2),
                tax_code: STANDARD_TAX_CODE.to_string(),
                taxable_amount: Decimal::new(1552, 2),
                tax_amount: Decimal::new(248, 2),
                total_amount: Decimal::new(1800, 2),
            }],
        }
    }

    #[test]
    fn maps_direct_fields_and_defaults_payment_type() {
        let payload = build_payload(&source(), &StandardVatRule).unwrap();
        assert_eq!(payload.bhf_id, "000");
        assert_eq!(payload.device_serial_no, "DEV-01");
        assert_eq!(payload.invc_no, "INV-7");
        assert_eq!(payload.sales_dt, "2025-09-24T00:00:00");
        assert_eq!(payload.payment_type, "CASH");
        assert_eq!(payload.total_item_cnt, 1);
    }

    #[test]
    fn derives_invoice_and_transaction_types_for_all_code_pairs() {
        let cases = [
            ("N", "S", "NORMAL", "SALE"),
            ("N", "R", "NORMAL", "REFUND"),
            ("R", "S", "REFUND", "SALE"),
            ("R", "R", "REFUND", "REFUND"),
        ];
        for (sale, receipt, invoice_type, transaction_type) in cases {
            let mut src = source();
            src.sale_type_code = sale.to_string();
            src.receipt_type_code = receipt.to_string();
            let payload = build_payload(&src, &StandardVatRule).unwrap();
            assert_eq!(payload.invoice_type, invoice_type, "sale={sale}");
            assert_eq!(payload.transaction_type, transaction_type, "receipt={receipt}");
        }
    }

    #[test]
    fn keeps_explicit_payment_type() {
        let mut src = source();
        src.payment_type = Some("CARD".to_string());
        let payload = build_payload(&src, &StandardVatRule).unwrap();
        assert_eq!(payload.payment_type, "CARD");
    }

    #[test]
    fn standard_code_is_vat_everything_else_exempt() {
        let rule = StandardVatRule;
        let standard = rule.classify("A");
        assert_eq!(standard.category, "VAT");
        assert_eq!(standard.rate, Decimal::from(16));

        for code in ["B", "C1", "EXM", ""] {
            let class = rule.classify(code);
            assert_eq!(class.category, "EXEMPT", "code={code}");
            assert_eq!(class.rate, Decimal::ZERO);
        }
    }

    #[test]
    fn line_items_carry_category_and_rate_from_rule() {
        let mut src = source();
        src.items.push(SourceLineItem {
            item_code: "P000002".to_string(),
            item_name: "Bottled water".to_string(),
            quantity: 1,
            unit_price: Decimal::new(500, 2),
            tax_code: "B".to_string(),
            taxable_amount: Decimal::new(500, 2),
            tax_amount: Decimal::ZERO,
            total_amount: Decimal::new(500, 2),
        });
        let payload = build_payload(&src, &StandardVatRule).unwrap();
        assert_eq!(payload.items[0].tax_category, "VAT");
        assert_eq!(payload.items[0].tax_rate, 16.0);
        assert_eq!(payload.items[1].tax_category, "EXEMPT");
        assert_eq!(payload.items[1].tax_rate, 0.0);
    }

    #[test]
    fn serializes_with_authority_field_names() {
        let payload = build_payload(&source(), &StandardVatRule).unwrap();
        let value = serde_json::to_value(&payload).unwrap();
        for key in [
            "tpin",
            "bhfId",
            "deviceSerialNo",
            "invcNo",
            "salesDt",
            "invoiceType",
            "transactionType",
            "paymentType",
            "totalItemCnt",
            "totTaxblAmt",
            "totTaxAmt",
            "totAmt",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        let item = &value["items"][0];
        for key in ["itemCd", "itemNm", "qty", "prc", "taxblAmt", "taxCategory", "taxRate", "taxAmt", "totAmt"] {
            assert!(item.get(key).is_some(), "missing item {key}");
        }
        // Optional customer fields are omitted, not null.
        assert!(value.get("customerTpin").is_none());
    }

    #[test]
    fn rejects_empty_invoice_number_and_empty_items() {
        let mut src = source();
        src.invoice_number = "  ".to_string();
        assert!(matches!(
            build_payload(&src, &StandardVatRule),
            Err(TransformError::Validation(_))
        ));

        let mut src = source();
        src.items.clear();
        assert!(matches!(
            build_payload(&src, &StandardVatRule),
            Err(TransformError::Validation(_))
        ));
    }

    #[test]
    fn rejects_non_positive_quantity() {
        let mut src = source();
        src.items[0].quantity = 0;
        assert!(matches!(
            build_payload(&src, &StandardVatRule),
            Err(TransformError::Validation(_))
        ));
    }

    #[test]
    fn vat_breakdown_splits_inclusive_totals() {
        let (taxable, tax) = vat_breakdown(Decimal::new(11600, 2), Decimal::from(16));
        assert_eq!(tax, Decimal::new(1600, 2));
        assert_eq!(taxable, Decimal::new(10000, 2));

        let (taxable, tax) = vat_breakdown(Decimal::new(500, 2), Decimal::ZERO);
        assert_eq!(tax, Decimal::ZERO);
        assert_eq!(taxable, Decimal::new(500, 2));
    }

    #[test]
    fn deterministic_for_identical_input() {
        let a = build_payload(&source(), &StandardVatRule).unwrap();
        let b = build_payload(&source(), &StandardVatRule).unwrap();
        assert_eq!(serde_json::to_value(&a).unwrap(), serde_json::to_value(&b).unwrap());
    }
}
