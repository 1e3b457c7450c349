//! Output formatting for product records (table, JSON, markdown, CSV).

use crate::config::OutputFormat;
use crate::market::models::ProductRecord;

/// Formats product records for output.
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Creates a new formatter.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a result set.
    pub fn format_records(&self, records: &[ProductRecord]) -> String {
        if records.is_empty() {
            return match self.format {
                OutputFormat::Json => "[]".to_string(),
                OutputFormat::Csv => self.csv_header(),
                _ => "No products found.".to_string(),
            };
        }

        match self.format {
            OutputFormat::Json => self.json_records(records),
            OutputFormat::Table => self.table_records(records),
            OutputFormat::Markdown => self.markdown_records(records),
            OutputFormat::Csv => self.csv_records(records),
        }
    }

    // JSON formatting

    fn json_records(&self, records: &[ProductRecord]) -> String {
        serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".to_string())
    }

    // Table formatting

    fn table_records(&self, records: &[ProductRecord]) -> String {
        let pos_width = 4;
        let price_width = 12;
        let vendor_width = 18;
        let title_width = 50;

        let mut lines = Vec::new();

        lines.push(format!(
            "{:<pos_width$}  {:>price_width$}  {:<vendor_width$}  {}",
            "#", "Price", "Vendor", "Title"
        ));
        lines.push(format!(
            "{:-<pos_width$}  {:-<price_width$}  {:-<vendor_width$}  {:-<title_width$}",
            "", "", "", ""
        ));

        for record in records {
            let price_str = match record.price {
                Some(price) => format!("S/ {}", price),
                None => "N/A".to_string(),
            };

            let vendor = truncate(record.vendor().unwrap_or(""), vendor_width);
            let title = truncate(&record.title, title_width);

            lines.push(format!(
                "{:<pos_width$}  {:>price_width$}  {:<vendor_width$}  {}",
                record.position, price_str, vendor, title
            ));
        }

        lines.push(String::new());
        lines.push(format!("Total: {} products", records.len()));

        lines.join("\n")
    }

    // Markdown formatting

    fn markdown_records(&self, records: &[ProductRecord]) -> String {
        let mut lines = Vec::new();

        lines.push("| # | Price | Vendor | Title |".to_string());
        lines.push("|---|-------|--------|-------|".to_string());

        for record in records {
            let price_str = match record.price {
                Some(price) => format!("S/ {}", price),
                None => "N/A".to_string(),
            };

            let vendor = record.vendor().unwrap_or("");
            let title = truncate(&record.title, 40);

            lines.push(format!(
                "| {} | {} | {} | [{}]({}) |",
                record.position, price_str, vendor, title, record.url
            ));
        }

        lines.push(String::new());
        lines.push(format!("*{} products found*", records.len()));

        lines.join("\n")
    }

    // CSV formatting

    fn csv_header(&self) -> String {
        "position,title,price,price_text,brand,seller,site,keyword,url".to_string()
    }

    fn csv_records(&self, records: &[ProductRecord]) -> String {
        let mut lines = Vec::new();
        lines.push(self.csv_header());

        for record in records {
            let price = record.price.map(|p| p.to_string()).unwrap_or_default();
            let title = Self::csv_escape(&record.title);
            let price_text = Self::csv_escape(&record.price_text);
            let brand = record.brand.as_deref().map(Self::csv_escape).unwrap_or_default();
            let seller = record.seller.as_deref().map(Self::csv_escape).unwrap_or_default();

            lines.push(format!(
                "{},{},{},{},{},{},{},{},{}",
                record.position,
                title,
                price,
                price_text,
                brand,
                seller,
                record.site,
                Self::csv_escape(&record.keyword),
                record.url
            ));
        }

        lines.join("\n")
    }

    fn csv_escape(s: &str) -> String {
        if s.contains(',') || s.contains('"') || s.contains('\n') {
            format!("\"{}\"", s.replace('"', "\"\""))
        } else {
            s.to_string()
        }
    }
}

/// Truncates on character boundaries; titles are routinely accented Spanish.
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::sites::Site;
    use chrono::Utc;

    fn make_record() -> ProductRecord {
        ProductRecord {
            position: 1,
            title: "Mouse Gamer Logitech G203".to_string(),
            price_text: "S/ 89.90".to_string(),
            price: Some(90),
            url: "https://www.falabella.com.pe/p/g203".to_string(),
            brand: Some("Logitech".to_string()),
            seller: None,
            site: Site::Falabella,
            keyword: "mouse".to_string(),
            timestamp: Utc::now(),
            original_index: 0,
        }
    }

    fn make_priceless_record() -> ProductRecord {
        ProductRecord {
            position: 2,
            title: "Mouse sin precio".to_string(),
            price_text: String::new(),
            price: None,
            url: "https://www.falabella.com.pe/p/nada".to_string(),
            brand: None,
            seller: None,
            site: Site::Falabella,
            keyword: "mouse".to_string(),
            timestamp: Utc::now(),
            original_index: 1,
        }
    }

    #[test]
    fn test_json_records() {
        let formatter = Formatter::new(OutputFormat::Json);
        let output = formatter.format_records(&[make_record()]);

        assert!(output.starts_with('['));
        assert!(output.contains("Mouse Gamer Logitech G203"));
        assert!(output.contains("\"priceText\": \"S/ 89.90\""));
    }

    #[test]
    fn test_json_empty() {
        let formatter = Formatter::new(OutputFormat::Json);
        assert_eq!(formatter.format_records(&[]), "[]");
    }

    #[test]
    fn test_table_records() {
        let formatter = Formatter::new(OutputFormat::Table);
        let output = formatter.format_records(&[make_record(), make_priceless_record()]);

        assert!(output.contains("Price"));
        assert!(output.contains("Vendor"));
        assert!(output.contains("S/ 90"));
        assert!(output.contains("Logitech"));
        assert!(output.contains("N/A"));
        assert!(output.contains("Total: 2 products"));
    }

    #[test]
    fn test_table_empty() {
        let formatter = Formatter::new(OutputFormat::Table);
        assert_eq!(formatter.format_records(&[]), "No products found.");
    }

    #[test]
    fn test_table_seller_shown_for_mercadolibre() {
        let mut record = make_record();
        record.site = Site::MercadoLibre;
        record.brand = None;
        record.seller = Some("TiendaOficial".to_string());

        let formatter = Formatter::new(OutputFormat::Table);
        let output = formatter.format_records(&[record]);
        assert!(output.contains("TiendaOficial"));
    }

    #[test]
    fn test_markdown_records() {
        let formatter = Formatter::new(OutputFormat::Markdown);
        let output = formatter.format_records(&[make_record()]);

        assert!(output.contains("| # | Price | Vendor | Title |"));
        assert!(output.contains("S/ 90"));
        assert!(output.contains("[Mouse Gamer Logitech G203](https://www.falabella.com.pe/p/g203)"));
        assert!(output.contains("*1 products found*"));
    }

    #[test]
    fn test_csv_records() {
        let formatter = Formatter::new(OutputFormat::Csv);
        let output = formatter.format_records(&[make_record()]);

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("position,title,price"));
        assert!(lines[1].contains("Mouse Gamer Logitech G203"));
        assert!(lines[1].contains("falabella"));
        assert!(lines[1].contains("\"S/ 89.90\"") || lines[1].contains("S/ 89.90"));
    }

    #[test]
    fn test_csv_escape() {
        assert_eq!(Formatter::csv_escape("simple"), "simple");
        assert_eq!(Formatter::csv_escape("with,comma"), "\"with,comma\"");
        assert_eq!(Formatter::csv_escape("with\"quote"), "\"with\"\"quote\"");
    }

    #[test]
    fn test_truncate_is_char_safe() {
        // Byte-slicing this would split the accented character
        let title = "Audífonos inalámbricos con micrófono incorporado y estuche";
        let short = truncate(title, 20);
        assert!(short.ends_with("..."));
        assert!(short.chars().count() <= 20);

        assert_eq!(truncate("corto", 20), "corto");
    }
}
