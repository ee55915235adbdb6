use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use topichub_core::error::{Error, Result};
use topichub_core::types::ClusteringResult;

use crate::{finish, Mutation};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludeInfo {
    pub document_ids: Vec<String>,
    pub excluded: bool,
    pub documents_affected: usize,
}

/// Sets or clears the `excluded` flag. Membership is left alone, so no
/// topic changes and no suggestion is invalidated.
pub fn set_excluded(result: &ClusteringResult, document_ids: &[String], excluded: bool) -> Result<Mutation<ExcludeInfo>> {
    if document_ids.is_empty() {
        return Err(Error::invalid("No document ids given."));
    }
    let wanted: HashSet<&str> = document_ids.iter().map(String::as_str).collect();
    let found = result.documents.iter().filter(|d| wanted.contains(d.id.as_str())).count();
    if found == 0 {
        return Err(Error::invalid("None of the given documents exist."));
    }

    let mut next = result.clone();
    let mut affected = 0;
    for doc in next.documents.iter_mut().filter(|d| wanted.contains(d.id.as_str())) {
        if doc.excluded != excluded {
            doc.excluded = excluded;
            affected += 1;
        }
    }
    let next = finish("exclude", next)?;

    Ok(Mutation {
        result: next,
        info: ExcludeInfo { document_ids: document_ids.to_vec(), excluded, documents_affected: affected },
    })
}
