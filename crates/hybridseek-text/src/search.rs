use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::Value;
use tantivy::{IndexReader, ReloadPolicy, TantivyDocument};

use hybridseek_core::error::{Error, Result};
use hybridseek_core::types::{ScoredHit, SourceKind};

use crate::index::FulltextIndex;

impl FulltextIndex {
	/// BM25 top-k over the text field, best first.
	///
	/// Questions are parsed leniently: syntax the query language rejects
	/// (stray `:` or unbalanced parentheses) is dropped rather than failing.
	pub fn search(&self, question: &str, k: usize) -> Result<Vec<ScoredHit>> {
		if k == 0 {
			return Ok(vec![]);
		}
		let reader: IndexReader = self
			.index
			.reader_builder()
			.reload_policy(ReloadPolicy::Manual)
			.try_into()
			.map_err(Error::storage)?;
		let searcher = reader.searcher();
		let qp = QueryParser::for_index(&self.index, vec![self.text_field]);
		let (query, errors) = qp.parse_query_lenient(question);
		if !errors.is_empty() {
			tracing::debug!(index = %self.name(), ?errors, "lenient parse dropped query fragments");
		}
		let top_docs = searcher.search(&*query, &TopDocs::with_limit(k)).map_err(Error::storage)?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr).map_err(Error::storage)?;
			let Some(index) = doc.get_first(self.index_field).and_then(|v| v.as_u64()) else {
				return Err(Error::storage(format!("document in '{}' has no chunk index", self.name())));
			};
			let text = doc.get_first(self.text_field).and_then(|v| v.as_str()).unwrap_or("").to_string();
			hits.push(ScoredHit { index, text, raw_score: score, source: SourceKind::Keyword });
		}
		Ok(hits)
	}
}
