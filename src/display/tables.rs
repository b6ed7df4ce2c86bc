//! Table formatting for recommendations and index summaries.

use comfy_table::{
    Attribute, Cell, CellAlignment, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
};

use crate::recommend::Recommendation;
use crate::vector::IndexInfo;

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.apply_modifier(UTF8_ROUND_CORNERS);
    table
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|name| Cell::new(name).add_attribute(Attribute::Bold))
        .collect()
}

/// Ranked recommendations, best first.
pub fn create_recommendation_table(recommendations: &[Recommendation]) -> String {
    let mut table = new_table();
    table.set_header(header(&["#", "Score", "Id", "Name", "Price", "Url"]));

    for (rank, rec) in recommendations.iter().enumerate() {
        table.add_row(vec![
            Cell::new(rank + 1),
            Cell::new(format!("{:.4}", rec.score)).set_alignment(CellAlignment::Right),
            Cell::new(&rec.id),
            Cell::new(&rec.name),
            Cell::new(format!("{:.2}", rec.price)).set_alignment(CellAlignment::Right),
            Cell::new(&rec.url),
        ]);
    }

    table.to_string()
}

/// Key facts about a built index.
pub fn create_info_table(info: &IndexInfo) -> String {
    let mut table = new_table();
    table.set_header(header(&["Property", "Value"]));

    table.add_row(vec!["Path".to_string(), info.path.display().to_string()]);
    table.add_row(vec!["Items".to_string(), info.count.to_string()]);
    table.add_row(vec!["Dimension".to_string(), info.dimension.to_string()]);
    table.add_row(vec!["Backend".to_string(), info.backend.to_string()]);
    table.add_row(vec!["Embedder".to_string(), info.embedder.clone()]);
    table.add_row(vec!["Created (unix)".to_string(), info.created_at.to_string()]);

    table.to_string()
}
