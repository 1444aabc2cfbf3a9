//! Product Aggregate
//!
//! Turns the flat item and stock feeds into a style-keyed catalog. External
//! field names stop at [`RawItemRow`] / [`RawStockRow`]; everything past
//! [`ItemRow::normalize`] works on portal types only.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use crate::domain::value_objects::{natural_cmp, parse_mrp, Barcode, ColorRef, StockLevel};

/// Catalog page size used by the portal listing.
pub const PAGE_SIZE: usize = 20;

/// A feed value that may arrive as either a JSON string or a JSON number.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Loose { Text(String), Number(serde_json::Number) }

impl Loose {
    pub fn text(&self) -> String {
        match self { Self::Text(s) => s.trim().to_string(), Self::Number(n) => n.to_string() }
    }

    /// Whole, non-negative count; anything else reads as zero.
    pub fn count(&self) -> u32 {
        let value = match self {
            Self::Text(s) => s.trim().parse::<f64>().ok(),
            Self::Number(n) => n.as_f64(),
        };
        match value {
            Some(v) if v.is_finite() && v > 0.0 => v.min(u32::MAX as f64) as u32,
            _ => 0,
        }
    }
}

fn loose_text(value: &Option<Loose>) -> String { value.as_ref().map(Loose::text).unwrap_or_default() }

/// Item row in the shape the catalog feed publishes it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawItemRow {
    #[serde(rename = "Style", alias = "style")] pub style: Option<Loose>,
    #[serde(rename = "Barcode", alias = "barcode")] pub barcode: Option<Loose>,
    #[serde(rename = "Color", alias = "color")] pub color: Option<Loose>,
    #[serde(rename = "Color Name", alias = "ColorName", alias = "colorName")] pub color_name: Option<Loose>,
    #[serde(rename = "Size", alias = "size")] pub size: Option<Loose>,
    #[serde(rename = "MRP", alias = "mrp")] pub mrp: Option<Loose>,
    #[serde(rename = "Description", alias = "description")] pub description: Option<Loose>,
    #[serde(rename = "Category", alias = "category")] pub category: Option<Loose>,
}

/// Stock row in the shape the stock feed publishes it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawStockRow {
    #[serde(rename = "item name", alias = "Item Name", alias = "style", alias = "Style")] pub item_name: Option<Loose>,
    #[serde(rename = "color", alias = "Color")] pub color: Option<Loose>,
    #[serde(rename = "size", alias = "Size")] pub size: Option<Loose>,
    #[serde(rename = "quantity", alias = "Quantity", alias = "qty")] pub quantity: Option<Loose>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ItemRow {
    pub style: String,
    pub barcode: Barcode,
    pub color: ColorRef,
    pub size: String,
    pub mrp: Decimal,
    pub description: String,
    pub category: String,
}

impl ItemRow {
    /// Rows without a style are dropped. A missing barcode is synthesized from
    /// the variant triple so the row can still be carted.
    pub fn normalize(raw: &RawItemRow) -> Option<Self> {
        let style = loose_text(&raw.style);
        if style.is_empty() { return None; }
        let code = loose_text(&raw.color);
        let color = ColorRef::new(&code, &loose_text(&raw.color_name));
        let size = loose_text(&raw.size).to_uppercase();
        let barcode = match loose_text(&raw.barcode) {
            b if b.is_empty() => Barcode::new(stock_key(&style, &color.code, &size)),
            b => Barcode::new(b),
        };
        Some(Self {
            barcode, color, size,
            mrp: raw.mrp.as_ref().map(|m| parse_mrp(&m.text())).unwrap_or(Decimal::ZERO),
            description: loose_text(&raw.description),
            category: loose_text(&raw.category),
            style,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StockRow { pub style: String, pub color: String, pub size: String, pub quantity: u32 }

impl StockRow {
    pub fn normalize(raw: &RawStockRow) -> Option<Self> {
        let style = loose_text(&raw.item_name);
        if style.is_empty() { return None; }
        Some(Self {
            style,
            color: loose_text(&raw.color),
            size: loose_text(&raw.size),
            quantity: raw.quantity.as_ref().map(Loose::count).unwrap_or(0),
        })
    }
}

/// Lookup key shared by stock rows and item rows.
pub fn stock_key(style: &str, color: &str, size: &str) -> String {
    format!("{}-{}-{}", style.trim().to_uppercase(), color.trim().to_uppercase(), size.trim().to_uppercase())
}

/// Externally curated best-seller style codes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BestSellers(HashSet<String>);

impl BestSellers {
    pub fn new<I, S>(styles: I) -> Self where I: IntoIterator<Item = S>, S: AsRef<str> {
        Self(styles.into_iter().map(|s| s.as_ref().trim().to_uppercase()).filter(|s| !s.is_empty()).collect())
    }
    pub fn contains(&self, style: &str) -> bool { self.0.contains(&style.trim().to_uppercase()) }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    pub barcode: Barcode,
    pub style: String,
    pub color: ColorRef,
    pub size: String,
    pub mrp: Decimal,
    pub description: String,
    pub stock: u32,
}

impl ProductVariant {
    pub fn stock_level(&self) -> StockLevel { StockLevel::from_stock(self.stock) }
    pub fn is_in_stock(&self) -> bool { self.stock > 0 }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub style: String,
    pub variants: Vec<ProductVariant>,
    pub colors: Vec<ColorRef>,
    pub min_mrp: Decimal,
    pub max_mrp: Decimal,
    pub category: String,
    pub description: String,
    pub best_seller: bool,
}

impl Product {
    fn start(row: &ItemRow) -> Self {
        Self {
            style: row.style.clone(), variants: vec![], colors: vec![],
            min_mrp: row.mrp, max_mrp: row.mrp,
            category: String::new(), description: String::new(), best_seller: false,
        }
    }

    fn absorb(&mut self, row: ItemRow, stock: u32) {
        self.min_mrp = self.min_mrp.min(row.mrp);
        self.max_mrp = self.max_mrp.max(row.mrp);
        if !self.colors.iter().any(|c| c.code == row.color.code) { self.colors.push(row.color.clone()); }
        if self.category.is_empty() { self.category = row.category.clone(); }
        if self.description.is_empty() { self.description = row.description.clone(); }
        self.variants.push(ProductVariant {
            barcode: row.barcode, style: row.style, color: row.color,
            size: row.size, mrp: row.mrp, description: row.description, stock,
        });
    }

    // Variants follow colour first-seen order, then natural size order.
    fn sort_variants(&mut self) {
        let colors = &self.colors;
        let rank = |code: &str| colors.iter().position(|c| c.code == code).unwrap_or(usize::MAX);
        self.variants.sort_by(|a, b| rank(&a.color.code).cmp(&rank(&b.color.code)).then_with(|| natural_cmp(&a.size, &b.size)));
    }

    pub fn variants_for_color(&self, color_code: &str) -> impl Iterator<Item = &ProductVariant> + '_ {
        let code = color_code.trim().to_string();
        self.variants.iter().filter(move |v| v.color.code.eq_ignore_ascii_case(&code))
    }

    pub fn total_stock(&self) -> u64 { self.variants.iter().map(|v| u64::from(v.stock)).sum() }
}

/// The aggregated, read-only catalog snapshot for a session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Catalog {
    products: Vec<Product>,
    by_style: HashMap<String, usize>,
    by_barcode: HashMap<Barcode, (usize, usize)>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CatalogPage<'a> {
    pub products: Vec<&'a Product>,
    pub page: usize,
    pub total_pages: usize,
    pub total: usize,
}

impl Catalog {
    /// Groups item rows by style and resolves advisory stock.
    ///
    /// Never fails: malformed rows degrade to zero price or zero stock. When a
    /// stock key repeats, the last row wins. Best-sellers sort first, then the
    /// remaining styles alphabetically.
    pub fn aggregate(items: &[RawItemRow], stock: &[RawStockRow], best_sellers: &BestSellers) -> Self {
        let stock_map: HashMap<String, u32> = stock.iter()
            .filter_map(StockRow::normalize)
            .map(|s| (stock_key(&s.style, &s.color, &s.size), s.quantity))
            .collect();

        let mut products: Vec<Product> = Vec::new();
        let mut slots: HashMap<String, usize> = HashMap::new();
        for row in items.iter().filter_map(ItemRow::normalize) {
            let slot = *slots.entry(row.style.clone()).or_insert_with(|| {
                products.push(Product::start(&row));
                products.len() - 1
            });
            let on_hand = stock_map.get(&stock_key(&row.style, &row.color.code, &row.size)).copied().unwrap_or(0);
            products[slot].absorb(row, on_hand);
        }

        for product in &mut products {
            product.best_seller = best_sellers.contains(&product.style);
            product.sort_variants();
        }
        products.sort_by(|a, b| b.best_seller.cmp(&a.best_seller).then_with(|| a.style.cmp(&b.style)));
        Self::index(products)
    }

    fn index(products: Vec<Product>) -> Self {
        let mut by_style = HashMap::new();
        let mut by_barcode = HashMap::new();
        for (p, product) in products.iter().enumerate() {
            by_style.insert(product.style.clone(), p);
            for (v, variant) in product.variants.iter().enumerate() {
                by_barcode.entry(variant.barcode.clone()).or_insert((p, v));
            }
        }
        Self { products, by_style, by_barcode }
    }

    pub fn products(&self) -> &[Product] { &self.products }
    pub fn len(&self) -> usize { self.products.len() }
    pub fn is_empty(&self) -> bool { self.products.is_empty() }
    pub fn get(&self, style: &str) -> Option<&Product> { self.by_style.get(style.trim()).map(|&i| &self.products[i]) }

    pub fn variant(&self, barcode: &Barcode) -> Option<&ProductVariant> {
        self.by_barcode.get(barcode).map(|&(p, v)| &self.products[p].variants[v])
    }

    pub fn variants(&self) -> impl Iterator<Item = &ProductVariant> {
        self.products.iter().flat_map(|p| p.variants.iter())
    }

    /// Case-insensitive substring match on the style code.
    pub fn search(&self, query: &str) -> Vec<&Product> {
        let needle = query.trim().to_lowercase();
        self.products.iter().filter(|p| needle.is_empty() || p.style.to_lowercase().contains(&needle)).collect()
    }

    /// One-based page of the search results.
    pub fn page(&self, query: &str, page: usize) -> CatalogPage<'_> {
        let matches = self.search(query);
        let total = matches.len();
        let total_pages = total.div_ceil(PAGE_SIZE);
        let page = page.max(1);
        let products = matches.into_iter().skip((page - 1).saturating_mul(PAGE_SIZE)).take(PAGE_SIZE).collect();
        CatalogPage { products, page, total_pages, total }
    }
}
