//! Scenario relevance index.
//!
//! Clinical scenario teaching texts live as markdown files under the data
//! dir; they are indexed in RAM once at startup and matched against note
//! text to pull relevant reference material into analysis output.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, anyhow};
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, STORED, STRING, Schema, TEXT, Value};
use tantivy::{DocAddress, Index, IndexReader, Score, TantivyDocument, Term};

use crate::models::ScenarioMatch;

#[derive(Debug, Clone)]
struct ScenarioFields {
    name: Field,
    body: Field,
}

pub struct ScenarioEngine {
    reader: IndexReader,
    fields: ScenarioFields,
    contents: HashMap<String, String>,
    names: Vec<String>,
}

impl ScenarioEngine {
    /// Index every `.md` file under `scenarios_dir`. A missing or empty
    /// directory yields an engine that simply matches nothing.
    pub fn load(scenarios_dir: &Path) -> anyhow::Result<Self> {
        let mut docs: Vec<(String, String)> = Vec::new();
        if scenarios_dir.is_dir() {
            for entry in std::fs::read_dir(scenarios_dir)
                .with_context(|| format!("read {}", scenarios_dir.display()))?
            {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("md") {
                    continue;
                }
                let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("read {}", path.display()))?;
                if content.trim().is_empty() {
                    continue;
                }
                docs.push((name.to_string(), content));
            }
        }
        docs.sort_by(|a, b| a.0.cmp(&b.0));
        tracing::info!(
            "Indexed {} scenarios from {}",
            docs.len(),
            scenarios_dir.display()
        );
        Self::from_documents(docs)
    }

    pub fn from_documents(docs: Vec<(String, String)>) -> anyhow::Result<Self> {
        let schema = scenario_schema();
        let index = Index::create_in_ram(schema);
        let fields = scenario_fields(&index.schema())?;

        let mut writer = index
            .writer_with_num_threads(1, 50_000_000)
            .context("create scenario index writer")?;
        for (name, content) in &docs {
            let mut doc = tantivy::doc!();
            doc.add_text(fields.name, name);
            doc.add_text(fields.body, content);
            writer.add_document(doc)?;
        }
        writer.commit().context("commit scenario index")?;

        let reader = index.reader().context("create scenario index reader")?;
        let names = docs.iter().map(|(name, _)| name.clone()).collect();
        let contents = docs.into_iter().collect();

        Ok(Self {
            reader,
            fields,
            contents,
            names,
        })
    }

    pub fn list_scenarios(&self) -> &[String] {
        &self.names
    }

    pub fn scenario_content(&self, name: &str) -> Option<&str> {
        self.contents.get(name).map(String::as_str)
    }

    /// Match note text against the corpus and return the best-scoring
    /// scenarios. Term queries over tokenized words keep this robust to
    /// arbitrary note text.
    pub fn match_scenarios(&self, text: &str, limit: usize) -> anyhow::Result<Vec<ScenarioMatch>> {
        let terms = query_terms(text);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let clauses: Vec<(Occur, Box<dyn Query>)> = terms
            .iter()
            .map(|word| {
                let term = Term::from_field_text(self.fields.body, word);
                let query: Box<dyn Query> =
                    Box::new(TermQuery::new(term, IndexRecordOption::Basic));
                (Occur::Should, query)
            })
            .collect();
        let query = BooleanQuery::new(clauses);

        let searcher = self.reader.searcher();
        let limit = limit.clamp(1, 10);
        let top_docs: Vec<(Score, DocAddress)> = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .context("scenario search")?;

        let mut out = Vec::new();
        for (score, addr) in top_docs {
            let doc: TantivyDocument = searcher.doc(addr)?;
            let name = doc
                .get_first(self.fields.name)
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow!("missing name in scenario doc"))?
                .to_string();
            let content = self
                .contents
                .get(&name)
                .cloned()
                .unwrap_or_default();
            out.push(ScenarioMatch {
                name,
                score,
                content,
            });
        }
        Ok(out)
    }
}

fn scenario_schema() -> Schema {
    let mut b = Schema::builder();
    b.add_text_field("name", STRING | STORED);
    b.add_text_field("body", TEXT);
    b.build()
}

fn scenario_fields(schema: &Schema) -> anyhow::Result<ScenarioFields> {
    Ok(ScenarioFields {
        name: schema.get_field("name")?,
        body: schema.get_field("body")?,
    })
}

const QUERY_STOPWORDS: &[&str] = &[
    "the", "and", "with", "for", "was", "were", "are", "has", "had", "this", "that", "from",
    "patient", "left", "right", "noted", "seen", "his", "her", "their",
];

fn query_terms(text: &str) -> Vec<String> {
    let lower = text.to_ascii_lowercase();
    let mut terms: Vec<String> = Vec::new();
    for word in lower.split(|c: char| !c.is_ascii_alphanumeric()) {
        if word.len() < 3 || QUERY_STOPWORDS.contains(&word) {
            continue;
        }
        if !terms.iter().any(|t| t == word) {
            terms.push(word.to_string());
        }
        if terms.len() >= 48 {
            break;
        }
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_engine() -> ScenarioEngine {
        ScenarioEngine::from_documents(vec![
            (
                "ak_field_treatment".to_string(),
                "Actinic keratosis destruction with cryotherapy. Count lesions \
                 individually; fifteen or more supports field treatment."
                    .to_string(),
            ),
            (
                "psoriasis_chronic_care".to_string(),
                "Chronic plaque psoriasis management. Examine nails for pitting \
                 and onycholysis; debridement may be billable."
                    .to_string(),
            ),
        ])
        .expect("in-ram scenario index")
    }

    #[test]
    fn matches_rank_by_term_overlap() {
        let engine = sample_engine();
        let matches = engine
            .match_scenarios("Cryotherapy destruction of actinic keratosis lesions", 5)
            .unwrap();
        assert!(!matches.is_empty());
        assert_eq!(matches[0].name, "ak_field_treatment");
        assert!(matches[0].content.contains("cryotherapy"));
    }

    #[test]
    fn unmatched_text_returns_empty() {
        let engine = sample_engine();
        let matches = engine.match_scenarios("", 5).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn listing_and_direct_content_lookup() {
        let engine = sample_engine();
        assert_eq!(engine.list_scenarios().len(), 2);
        assert!(engine.scenario_content("psoriasis_chronic_care").is_some());
        assert!(engine.scenario_content("missing").is_none());
    }
}
