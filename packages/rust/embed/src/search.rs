//! Cosine-similarity search over embedded unit files.
//!
//! Embeds the query with the same provider that embedded the rolls, then
//! ranks voters across the requested units. Units whose embedded file is
//! missing or unreadable are skipped with a warning; voters without an
//! embedding are ignored.

use std::path::Path;

use tracing::{debug, warn};

use rollcall_shared::{Result, UnitId, VoterRecord, artifact};

use crate::provider::EmbeddingProvider;

/// One ranked search result with its unit context.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub unit: UnitId,
    pub ward: String,
    pub polling_station: String,
    pub voter: VoterRecord,
    pub score: f32,
}

/// Search the embedded files of `units` for the voters closest to `query`.
///
/// Fails only when the query itself cannot be embedded; per-unit problems
/// degrade to a smaller result set.
pub fn search_units(
    output_dir: &Path,
    units: &[UnitId],
    provider: &mut dyn EmbeddingProvider,
    query: &str,
    top_k: usize,
) -> Result<Vec<SearchHit>> {
    let query_vec = provider.embed(query)?;

    let mut hits = Vec::new();

    for unit in units {
        let path = artifact::embedded_unit_path(output_dir, unit);
        let ward = match artifact::read_ward(&path) {
            Ok(ward) => ward,
            Err(e) => {
                warn!(unit = %unit, error = %e, "skipping unit without embedded file");
                continue;
            }
        };

        let mut missing = 0usize;
        for voter in ward.voters {
            let Some(embedding) = voter.embedding.as_deref() else {
                missing += 1;
                continue;
            };
            let score = cosine(&query_vec, embedding);
            hits.push(SearchHit {
                unit: unit.clone(),
                ward: ward.ward.clone(),
                polling_station: ward.polling_station.clone(),
                voter,
                score,
            });
        }

        if missing > 0 {
            warn!(unit = %unit, missing, "voters without embeddings were ignored");
        }
    }

    debug!(candidates = hits.len(), top_k, "ranking search hits");

    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(top_k);

    Ok(hits)
}

/// Cosine similarity between two vectors. Zero-norm input scores 0.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }

    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }

    dot / (na.sqrt() * nb.sqrt())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_shared::{Age, WardRecord};
    use std::path::PathBuf;

    /// Embeds any query as a fixed direction so ranking is predictable.
    struct QueryProvider(Vec<f32>);

    impl EmbeddingProvider for QueryProvider {
        fn embed(&mut self, _text: &str) -> rollcall_shared::Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    fn voter(serial: u32, name: &str, embedding: Option<Vec<f32>>) -> VoterRecord {
        VoterRecord {
            serial,
            name: name.into(),
            guardian: String::new(),
            house_no: "1".into(),
            house_name: "H".into(),
            gender: "F".into(),
            age: Age::Years(30),
            id: format!("KL{serial:07}"),
            embedding,
        }
    }

    fn ward_with(voters: Vec<VoterRecord>) -> WardRecord {
        WardRecord {
            district: "Ernakulam".into(),
            local_body: "Kochi".into(),
            ward: "Ward 1".into(),
            polling_station: "Govt HS".into(),
            voters,
        }
    }

    fn temp_dir() -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("rollcall-search-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = [0.5f32, 0.25, -1.0];
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert!(cosine(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_of_opposite_vectors_is_negative_one() {
        assert!((cosine(&[1.0, 2.0], &[-1.0, -2.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn ranks_closest_voters_first() {
        let tmp = temp_dir();
        let unit: UnitId = "1_english".parse().unwrap();

        artifact::write_ward(
            &artifact::embedded_unit_path(&tmp, &unit),
            &ward_with(vec![
                voter(1, "Far Away", Some(vec![0.0, 1.0])),
                voter(2, "Spot On", Some(vec![1.0, 0.0])),
                voter(3, "In Between", Some(vec![1.0, 1.0])),
            ]),
        )
        .unwrap();

        let mut provider = QueryProvider(vec![1.0, 0.0]);
        let hits = search_units(&tmp, &[unit], &mut provider, "spot on", 2).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].voter.name, "Spot On");
        assert_eq!(hits[1].voter.name, "In Between");
        assert!(hits[0].score > hits[1].score);
        assert_eq!(hits[0].ward, "Ward 1");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_unit_files_are_skipped() {
        let tmp = temp_dir();
        let present: UnitId = "1_english".parse().unwrap();
        let missing: UnitId = "2_english".parse().unwrap();

        artifact::write_ward(
            &artifact::embedded_unit_path(&tmp, &present),
            &ward_with(vec![voter(1, "Only Hit", Some(vec![1.0, 0.0]))]),
        )
        .unwrap();

        let mut provider = QueryProvider(vec![1.0, 0.0]);
        let hits = search_units(&tmp, &[missing, present], &mut provider, "q", 10).unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].voter.name, "Only Hit");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn voters_without_embeddings_are_ignored() {
        let tmp = temp_dir();
        let unit: UnitId = "1_english".parse().unwrap();

        artifact::write_ward(
            &artifact::embedded_unit_path(&tmp, &unit),
            &ward_with(vec![
                voter(1, "No Vector", None),
                voter(2, "Has Vector", Some(vec![1.0, 0.0])),
            ]),
        )
        .unwrap();

        let mut provider = QueryProvider(vec![1.0, 0.0]);
        let hits = search_units(&tmp, &[unit], &mut provider, "q", 10).unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].voter.name, "Has Vector");

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
