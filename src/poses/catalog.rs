use serde::Serialize;

pub const DEFAULT_POSE_ID: &str = "vrksana";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub english_name: &'static str,
    /// Main benefit, shown as the pose's target.
    pub focus: &'static str,
}

pub const CATALOG: &[CatalogEntry] = &[
    entry("vrksana", "Vrksasana", "Tree Pose", "Improves balance and stability"),
    entry("adhomukha", "Adho Mukha", "Downward Dog", "Stretches the hamstrings, calves, and shoulders"),
    entry("balasana", "Balasana", "Child's Pose", "Gently stretches the lower back and hips"),
    entry("tadasan", "Tadasana", "Mountain Pose", "Improves posture and alignment"),
    entry("trikonasana", "Trikonasana", "Triangle Pose", "Stretches legs, hips, groin, and hamstrings"),
    entry("virabhadrasana", "Virabhadrasana", "Warrior Pose", "Strengthens legs, core, and back"),
    entry("bhujangasana", "Bhujangasana", "Cobra Pose", "Opens the chest and strengthens the spine"),
    entry("setubandhasana", "Setubandhasana", "Bridge Pose", "Strengthens the back, glutes, and hamstrings"),
    entry("uttanasana", "Uttanasana", "Standing Forward Bend", "Lengthens the hamstrings and calms the mind"),
    entry("shavasana", "Shavasana", "Corpse Pose", "Deep relaxation and recovery"),
    entry("ardhamatsyendrasana", "Ardha Matsyendrasana", "Half Lord of Fishes", "Improves spinal mobility"),
];

const fn entry(
    id: &'static str,
    name: &'static str,
    english_name: &'static str,
    focus: &'static str,
) -> CatalogEntry {
    CatalogEntry {
        id,
        name,
        english_name,
        focus,
    }
}

pub fn find(pose: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|entry| entry.id == pose)
}

/// Label used by pose pickers, e.g. "Vrksasana (Tree Pose)".
pub fn display_label(pose: &str) -> String {
    match find(pose) {
        Some(entry) => format!("{} ({})", entry.name, entry.english_name),
        None => title_case(pose),
    }
}

/// Maps a route parameter to a usable pose id. Missing, blank and the literal
/// string "undefined" (what a broken link produces) all land on the default.
pub fn resolve_pose_id(raw: Option<&str>) -> &str {
    match raw.map(str::trim) {
        None | Some("") | Some("undefined") => DEFAULT_POSE_ID,
        Some(pose) => pose,
    }
}

pub fn title_case(pose: &str) -> String {
    let mut chars = pose.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_placeholder_ids_to_default() {
        assert_eq!(resolve_pose_id(None), "vrksana");
        assert_eq!(resolve_pose_id(Some("undefined")), "vrksana");
        assert_eq!(resolve_pose_id(Some("  ")), "vrksana");
        assert_eq!(resolve_pose_id(Some("balasana")), "balasana");
    }

    #[test]
    fn labels_known_and_unknown_poses() {
        assert_eq!(display_label("tadasan"), "Tadasana (Mountain Pose)");
        assert_eq!(display_label("crow"), "Crow");
    }

    #[test]
    fn catalog_matches_timing_table() {
        for entry in CATALOG {
            assert!(super::super::timing::has_timing(entry.id), "{}", entry.id);
        }
    }
}
