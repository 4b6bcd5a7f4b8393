use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::survey::Survey;

/// The difference for one survey between two trench states.
///
/// A side where the survey does not exist is represented as an empty survey.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub id: String,
    pub old: Survey,
    pub new: Survey,
}

/// Index surveys by identity. A later survey with a duplicate ID wins.
pub fn survey_map(surveys: &[Survey]) -> BTreeMap<String, Survey> {
    surveys
        .iter()
        .map(|s| (s.id().to_string(), s.clone()))
        .collect()
}

/// Compute the patches that turn `old` into `new`.
///
/// For every ID in the union of both sides, a patch is emitted iff the two
/// surveys differ structurally. Patch order follows sorted IDs, but callers
/// must not rely on ordering.
pub fn diff_surveys(old: &[Survey], new: &[Survey]) -> Vec<Patch> {
    let old_map = survey_map(old);
    let new_map = survey_map(new);

    let mut ids: BTreeSet<&String> = old_map.keys().collect();
    ids.extend(new_map.keys());

    let empty = Survey::new();
    let mut patches = Vec::new();
    for id in ids {
        let old_survey = old_map.get(id).unwrap_or(&empty);
        let new_survey = new_map.get(id).unwrap_or(&empty);
        if !old_survey.is_equal(new_survey) {
            patches.push(Patch {
                id: id.clone(),
                old: old_survey.clone(),
                new: new_survey.clone(),
            });
        }
    }
    patches
}
