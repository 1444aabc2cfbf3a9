//! Cart Aggregate
//!
//! The ledger holds at most one line per barcode and never holds a line with
//! a quantity below one.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::aggregates::product::{Catalog, ProductVariant};
use crate::domain::value_objects::{Barcode, ColorRef};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub barcode: Barcode,
    pub style: String,
    pub description: String,
    pub color: ColorRef,
    pub size: String,
    pub mrp: Decimal,
    pub quantity: u32,
}

impl CartLine {
    pub fn from_variant(variant: &ProductVariant, quantity: u32) -> Self {
        Self {
            barcode: variant.barcode.clone(), style: variant.style.clone(),
            description: variant.description.clone(), color: variant.color.clone(),
            size: variant.size.clone(), mrp: variant.mrp, quantity,
        }
    }

    pub fn line_total(&self) -> Decimal { self.mrp * Decimal::from(self.quantity) }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartLedger {
    lines: Vec<CartLine>,
}

/// A line whose quantity the catalog cannot back. Advisory only.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StockIssue {
    ExceedsStock { barcode: Barcode, requested: u32, available: u32 },
    NotInCatalog { barcode: Barcode },
}

impl CartLedger {
    pub fn new() -> Self { Self::default() }

    /// Rebuilds a ledger from persisted lines, restoring the one-line-per-barcode
    /// and positive-quantity invariants if the record was edited by hand.
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let mut cart = Self::new();
        for line in lines.into_iter().filter(|l| l.quantity > 0) { cart.add_to_cart(line); }
        cart
    }

    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn line(&self, barcode: &Barcode) -> Option<&CartLine> { self.lines.iter().find(|l| &l.barcode == barcode) }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn line_count(&self) -> usize { self.lines.len() }

    /// Merges into an existing line for the same barcode, otherwise appends.
    /// A zero-quantity line is ignored.
    pub fn add_to_cart(&mut self, line: CartLine) {
        if line.quantity == 0 { return; }
        if let Some(existing) = self.lines.iter_mut().find(|l| l.barcode == line.barcode) {
            existing.quantity = existing.quantity.saturating_add(line.quantity);
        } else {
            self.lines.push(line);
        }
    }

    /// Sets a line's quantity; anything at or below zero removes the line.
    /// Returns whether a line with that barcode existed.
    pub fn update_quantity(&mut self, barcode: &Barcode, quantity: i64) -> bool {
        if quantity <= 0 { return self.remove_from_cart(barcode); }
        match self.lines.iter_mut().find(|l| &l.barcode == barcode) {
            Some(line) => { line.quantity = u32::try_from(quantity).unwrap_or(u32::MAX); true }
            None => false,
        }
    }

    pub fn remove_from_cart(&mut self, barcode: &Barcode) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| &l.barcode != barcode);
        self.lines.len() != before
    }

    pub fn clear_cart(&mut self) { self.lines.clear(); }

    pub fn total_items(&self) -> u64 { self.lines.iter().map(|l| u64::from(l.quantity)).sum() }
    pub fn total_amount(&self) -> Decimal { self.lines.iter().map(CartLine::line_total).sum() }

    pub fn stock_issues(&self, catalog: &Catalog) -> Vec<StockIssue> {
        self.lines.iter().filter_map(|line| match catalog.variant(&line.barcode) {
            None => Some(StockIssue::NotInCatalog { barcode: line.barcode.clone() }),
            Some(v) if line.quantity > v.stock => Some(StockIssue::ExceedsStock {
                barcode: line.barcode.clone(), requested: line.quantity, available: v.stock,
            }),
            Some(_) => None,
        }).collect()
    }
}
