//! Grouping of templates that can be processed identically
//!
//! Each group is built around a "master" template: every template processed
//! the same way as the master joins its group. Membership is checked pairwise
//! against the master only, never propagated transitively, and the cost is
//! quadratic in the number of templates (collections are tens to low
//! thousands of templates).

use super::{Template, same_processing};
use tracing::{debug, info};

/// Partition template indices into same-processing groups.
///
/// Groups come out in the order their master was first encountered; within a
/// group indices are in input order with the master first. A master equal to
/// a template already grouped is skipped, and templates equal to the master
/// are not added to its group, so exact duplicates collapse to their first
/// occurrence.
pub fn group_indices(templates: &[Template]) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();

    for (master_idx, master) in templates.iter().enumerate() {
        let already_grouped = groups
            .iter()
            .flatten()
            .any(|&idx| templates[idx] == *master);
        if already_grouped {
            debug!(
                "Template {} already grouped, not starting a new group",
                master.display_name()
            );
            continue;
        }

        let mut group = vec![master_idx];
        for (idx, candidate) in templates.iter().enumerate() {
            if idx == master_idx {
                continue;
            }
            if same_processing(master, candidate) && candidate != master {
                group.push(idx);
            }
        }

        debug!(
            "Template group {} led by {} holds {} templates",
            groups.len(),
            master.display_name(),
            group.len()
        );
        groups.push(group);
    }

    groups
}

/// Group templates into sets of similarly processed templates
pub fn group_templates(templates: &[Template]) -> Vec<Vec<Template>> {
    let groups: Vec<Vec<Template>> = group_indices(templates)
        .into_iter()
        .map(|group| group.into_iter().map(|idx| templates[idx].clone()).collect())
        .collect();

    info!(
        "Grouped {} templates into {} processing groups",
        templates.len(),
        groups.len()
    );

    groups
}
