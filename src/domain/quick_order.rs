//! Quick-order bulk entry: one `Style,Size,Color,Quantity` per line.

use serde::Serialize;
use std::collections::HashMap;
use crate::domain::aggregates::cart::{CartLedger, CartLine};
use crate::domain::aggregates::product::{stock_key, Catalog, ProductVariant};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status")]
pub enum LineOutcome {
    Found { variant: ProductVariant, quantity: u32 },
    #[serde(rename = "Invalid format")]
    InvalidFormat,
    #[serde(rename = "Variant not found")]
    VariantNotFound,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedLine {
    /// One-based line number in the submitted text.
    pub line_number: usize,
    pub line: String,
    #[serde(flatten)]
    pub outcome: LineOutcome,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct QuickOrderReport {
    pub lines: Vec<VerifiedLine>,
}

impl QuickOrderReport {
    pub fn found(&self) -> impl Iterator<Item = (&ProductVariant, u32)> {
        self.lines.iter().filter_map(|l| match &l.outcome {
            LineOutcome::Found { variant, quantity } => Some((variant, *quantity)),
            _ => None,
        })
    }

    pub fn found_count(&self) -> usize { self.found().count() }
    pub fn error_count(&self) -> usize { self.lines.len() - self.found_count() }

    /// Adds every found line to the cart, returning how many were added.
    pub fn add_to(&self, cart: &mut CartLedger) -> usize {
        let mut added = 0;
        for (variant, quantity) in self.found() {
            cart.add_to_cart(CartLine::from_variant(variant, quantity));
            added += 1;
        }
        added
    }
}

/// Lookup index over the catalog, keyed case-insensitively on the variant triple.
pub struct QuickOrderParser<'a> {
    index: HashMap<String, &'a ProductVariant>,
}

impl<'a> QuickOrderParser<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        let mut index = HashMap::new();
        for variant in catalog.variants() {
            index.entry(stock_key(&variant.style, &variant.color.code, &variant.size)).or_insert(variant);
        }
        Self { index }
    }

    /// Verifies each non-blank line on its own; a bad line never stops the rest.
    pub fn verify(&self, text: &str) -> QuickOrderReport {
        let lines = text.lines().enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| VerifiedLine { line_number: i + 1, line: line.trim().to_string(), outcome: self.verify_line(line) })
            .collect();
        QuickOrderReport { lines }
    }

    pub fn verify_line(&self, line: &str) -> LineOutcome {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let [style, size, color, quantity] = fields.as_slice() else { return LineOutcome::InvalidFormat };
        if style.is_empty() || size.is_empty() || color.is_empty() { return LineOutcome::InvalidFormat; }
        let quantity = match quantity.parse::<u32>() {
            Ok(q) if q > 0 => q,
            _ => return LineOutcome::InvalidFormat,
        };
        match self.index.get(&stock_key(style, color, size)) {
            Some(variant) => LineOutcome::Found { variant: (*variant).clone(), quantity },
            None => LineOutcome::VariantNotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::{BestSellers, RawItemRow};
    use crate::domain::value_objects::Barcode;
    use serde_json::json;

    fn catalog() -> Catalog {
        let items: Vec<RawItemRow> = serde_json::from_value(json!([
            { "Style": "A039", "Barcode": "B1", "Color": "SKIN", "Size": "32B", "MRP": "1,299" },
            { "Style": "A039", "Barcode": "B2", "Color": "SKIN", "Size": "34B", "MRP": "1,299" },
            { "Style": "F074", "Barcode": "B3", "Color": "BLACK", "Size": "M", "MRP": "699" },
        ])).unwrap();
        Catalog::aggregate(&items, &[], &BestSellers::default())
    }

    #[test]
    fn test_verify_line_outcomes() {
        let catalog = catalog();
        let parser = QuickOrderParser::new(&catalog);
        match parser.verify_line("A039,32B,SKIN,5") {
            LineOutcome::Found { variant, quantity } => { assert_eq!(variant.barcode, Barcode::new("B1")); assert_eq!(quantity, 5); }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(parser.verify_line(" a039 , 34b , skin , 2 "), LineOutcome::Found { quantity: 2, .. }));
        assert_eq!(parser.verify_line("A039,32B,SKIN"), LineOutcome::InvalidFormat);
        assert_eq!(parser.verify_line("A039,32B,SKIN,5,1"), LineOutcome::InvalidFormat);
        assert_eq!(parser.verify_line("A039,32B,SKIN,0"), LineOutcome::InvalidFormat);
        assert_eq!(parser.verify_line("A039,32B,SKIN,-3"), LineOutcome::InvalidFormat);
        assert_eq!(parser.verify_line("A039,,SKIN,3"), LineOutcome::InvalidFormat);
        assert_eq!(parser.verify_line("ZZZZ,1,RED,1"), LineOutcome::VariantNotFound);
    }

    #[test]
    fn test_bad_line_does_not_block_others() {
        let catalog = catalog();
        let text = "A039,32B,SKIN,5\nA039,34B,SKIN,1\n\nA039,32B,SKIN\nF074,M,BLACK,10\r\nF074,m,black,2\nA039,34B,SKIN,3\n";
        let report = QuickOrderParser::new(&catalog).verify(text);
        assert_eq!(report.lines.len(), 6);
        assert_eq!(report.found_count(), 5);
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.lines[2].line_number, 4);

        let mut cart = CartLedger::new();
        assert_eq!(report.add_to(&mut cart), 5);
        assert_eq!(cart.line_count(), 3);
        assert_eq!(cart.line(&Barcode::new("B3")).unwrap().quantity, 12);
    }

    #[test]
    fn test_report_serializes_status_tags() {
        let catalog = catalog();
        let report = QuickOrderParser::new(&catalog).verify("nope\nZZZZ,1,RED,1");
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["lines"][0]["status"], "Invalid format");
        assert_eq!(value["lines"][1]["status"], "Variant not found");
    }
}
