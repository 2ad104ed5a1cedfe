//! Pseudo-random slot assignment
//!
//! Pure selection: callers persist the result and run activation themselves.
//!
//! The two modes treat "nothing eligible" differently. A full shuffle clears a
//! slot whose pool is empty; a set shuffle with no enabled set makes no
//! selection and leaves every slot as it was.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::types::{AnimationEntry, AnimationSet, Slot, SlotSelection};

/// Outcome of a set shuffle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetPick {
    pub set_id: String,
    pub selection: SlotSelection,
}

/// Pick one enabled set uniformly; `None` when no set is enabled
pub fn randomize_set<'a, R, I>(sets: I, rng: &mut R) -> Option<SetPick>
where
    R: Rng + ?Sized,
    I: IntoIterator<Item = &'a AnimationSet>,
{
    let enabled: Vec<&AnimationSet> = sets.into_iter().filter(|set| set.enabled).collect();
    let set = enabled.choose(rng)?;

    let mut selection = SlotSelection::default();
    for slot in Slot::ALL {
        if let Some(filename) = set.filename(slot) {
            selection.set(slot, format!("{}/{}", set.id, filename));
        }
    }
    Some(SetPick {
        set_id: set.id.clone(),
        selection,
    })
}

/// Pick each slot independently from entries matching its target
///
/// Excluded ids are never chosen; a slot with an empty pool comes back empty.
pub fn randomize_all<R>(animations: &[AnimationEntry], exclusions: &[String], rng: &mut R) -> SlotSelection
where
    R: Rng + ?Sized,
{
    let mut selection = SlotSelection::default();
    for slot in Slot::ALL {
        let pool: Vec<&AnimationEntry> = animations
            .iter()
            .filter(|anim| anim.target == slot.target())
            .filter(|anim| !exclusions.contains(&anim.id))
            .collect();
        if let Some(anim) = pool.choose(rng) {
            selection.set(slot, anim.id.clone());
        }
    }
    selection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Source, Target};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn entry(id: &str, target: Target) -> AnimationEntry {
        AnimationEntry {
            id: id.to_string(),
            name: id.to_string(),
            target,
            source: Source::Local { relative_path: id.into() },
        }
    }

    fn set(id: &str, enabled: bool, boot: &str) -> AnimationSet {
        let mut set = AnimationSet::new(id);
        set.enabled = enabled;
        set.boot = boot.to_string();
        set
    }

    #[test]
    fn test_all_never_picks_excluded() {
        let animations = vec![
            entry("b1", Target::Boot),
            entry("b2", Target::Boot),
            entry("s1", Target::Suspend),
            entry("s2", Target::Suspend),
        ];
        let exclusions = vec!["b1".to_string(), "s2".to_string()];

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let selection = randomize_all(&animations, &exclusions, &mut rng);
            assert_eq!(selection.boot, "b2");
            assert_eq!(selection.suspend, "s1");
            assert_eq!(selection.throbber, "s1");
        }
    }

    #[test]
    fn test_all_clears_slot_with_empty_pool() {
        let animations = vec![entry("s1", Target::Suspend)];
        let mut rng = StdRng::seed_from_u64(7);
        let selection = randomize_all(&animations, &[], &mut rng);
        assert_eq!(selection.boot, "");
        assert_eq!(selection.suspend, "s1");
    }

    #[test]
    fn test_set_only_picks_enabled() {
        let sets = vec![
            set("off1", false, "a.webm"),
            set("on", true, "b.webm"),
            set("off2", false, "c.webm"),
        ];
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let pick = randomize_set(&sets, &mut rng).unwrap();
            assert_eq!(pick.set_id, "on");
            assert_eq!(pick.selection.boot, "on/b.webm");
            assert_eq!(pick.selection.suspend, "");
            assert_eq!(pick.selection.throbber, "");
        }
    }

    #[test]
    fn test_set_none_when_nothing_enabled() {
        let sets = vec![set("off", false, "a.webm")];
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(randomize_set(&sets, &mut rng), None);
        assert_eq!(randomize_set(&Vec::<AnimationSet>::new(), &mut rng), None);
    }

    #[test]
    fn test_set_draws_from_every_enabled_set() {
        let sets = vec![set("a", true, "x.webm"), set("b", true, "y.webm")];
        let mut rng = StdRng::seed_from_u64(42);
        let picked: std::collections::HashSet<_> = (0..100)
            .filter_map(|_| randomize_set(&sets, &mut rng))
            .map(|pick| pick.set_id)
            .collect();
        assert_eq!(picked.len(), 2);
    }
}
