use crate::domain::{OutputFormat, TaxOperator};

/// ENA result type searched for every request.
pub const SEARCH_RESULT: &str = "read_run";

/// Columns requested from the portal, in wire order.
pub const RUN_FIELDS: [&str; 10] = [
    "run_accession",
    "experiment_title",
    "tax_id",
    "tax_lineage",
    "scientific_name",
    "library_source",
    "library_strategy",
    "instrument_platform",
    "read_count",
    "first_public",
];

pub const DEFAULT_STRATEGY: &str = "RNA-Seq";
pub const DEFAULT_LIMIT: u64 = 10_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub taxonomy_id: String,
    pub strategy: String,
    pub operator: TaxOperator,
    /// 0 asks the portal for every matching record.
    pub limit: u64,
    pub requested_fields: Vec<String>,
    pub output_format: OutputFormat,
}

impl QueryRequest {
    pub fn query(&self) -> String {
        build_query(&self.taxonomy_id, &self.strategy, self.operator)
    }

    /// Form-encoded POST body; the portal has no `offset`, so a single bounded request is issued.
    pub fn form_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("result", SEARCH_RESULT.to_string()),
            ("query", self.query()),
            ("fields", self.requested_fields.join(",")),
            ("format", self.output_format.as_str().to_string()),
            ("limit", self.limit.to_string()),
        ]
    }
}

pub fn build_query(tax_id: &str, strategy: &str, operator: TaxOperator) -> String {
    format!("{}({tax_id}) AND library_strategy=\"{strategy}\"", operator.token())
}

pub fn build_request(
    tax_id: &str,
    limit: u64,
    strategy: &str,
    operator: TaxOperator,
    output_format: OutputFormat,
) -> QueryRequest {
    QueryRequest {
        taxonomy_id: tax_id.to_string(),
        strategy: strategy.to_string(),
        operator,
        limit,
        requested_fields: RUN_FIELDS.iter().map(|field| field.to_string()).collect(),
        output_format,
    }
}
