//! Slot table generation.
//!
//! Leaders are balanced by quota: with `n` nodes every node leads
//! `slot_num / n` slots and `slot_num % n` of them lead one more. Surviving
//! owners keep their roles while their quota allows, so adding or removing a
//! node only moves the slots that have to move.

use crate::error::{Error, Result};
use crate::slot::table::{Slot, SlotTable};
use crate::types::{NodeId, SlotId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Generates balanced slot tables from a data node set.
#[derive(Debug, Clone)]
pub struct SlotTableGenerator {
    slot_num: u32,
    replicas: usize,
}

/// Leader slots already handed out, against the per-node quota.
struct LeaderQuota {
    base: usize,
    extra: usize,
    extras_used: usize,
    counts: BTreeMap<NodeId, usize>,
}

impl LeaderQuota {
    fn new(nodes: &BTreeSet<NodeId>, slot_num: u32) -> Self {
        let n = nodes.len();
        Self {
            base: slot_num as usize / n,
            extra: slot_num as usize % n,
            extras_used: 0,
            counts: nodes.iter().map(|node| (node.clone(), 0)).collect(),
        }
    }

    fn count(&self, node: &NodeId) -> Option<usize> {
        self.counts.get(node).copied()
    }

    fn can_take(&self, node: &NodeId) -> bool {
        match self.count(node) {
            Some(c) if c < self.base => true,
            Some(c) if c == self.base => self.extras_used < self.extra,
            _ => false,
        }
    }

    fn take(&mut self, node: &NodeId) {
        if let Some(count) = self.counts.get_mut(node) {
            if *count == self.base {
                self.extras_used += 1;
            }
            *count += 1;
        }
    }
}

impl SlotTableGenerator {
    /// Create a generator for `slot_num` slots with `replicas` copies each.
    pub fn new(slot_num: u32, replicas: usize) -> Self {
        Self {
            slot_num,
            replicas: replicas.max(1),
        }
    }

    /// Generate a table for `nodes`, moving as little as possible from `previous`.
    ///
    /// Returns `previous` unchanged when the assignment would be identical.
    pub fn generate(&self, nodes: &[NodeId], previous: Option<&SlotTable>) -> Result<SlotTable> {
        let nodes: BTreeSet<NodeId> = nodes.iter().cloned().collect();
        let Some(first) = nodes.first().cloned() else {
            return Err(Error::NoDataNodes);
        };

        let leaders = self.assign_leaders(&nodes, &first, previous);
        let followers = self.assign_followers(&nodes, &leaders, previous);

        let slots = leaders.into_iter().zip(followers).enumerate().map(|(id, (leader, followers))| {
            let id = id as SlotId;
            let leader_epoch = match previous.and_then(|p| p.get_slot(id)) {
                Some(prev) if prev.leader == leader => prev.leader_epoch,
                Some(prev) => prev.leader_epoch + 1,
                None => 1,
            };
            Slot::new(id, leader_epoch, leader, followers)
        });

        let epoch = previous.map_or(1, |p| p.epoch() + 1);
        let table = SlotTable::new(epoch, slots);

        if let Some(prev) = previous {
            if prev.same_assignment(&table) {
                debug!(epoch = prev.epoch(), "Slot assignment unchanged");
                return Ok(prev.clone());
            }
        }

        debug!(
            epoch,
            nodes = nodes.len(),
            slots = table.slot_count(),
            "Generated slot table"
        );
        Ok(table)
    }

    fn assign_leaders(
        &self,
        nodes: &BTreeSet<NodeId>,
        first: &NodeId,
        previous: Option<&SlotTable>,
    ) -> Vec<NodeId> {
        let mut quota = LeaderQuota::new(nodes, self.slot_num);
        let mut leaders: Vec<Option<NodeId>> = vec![None; self.slot_num as usize];
        let prev_slot = |id: usize| previous.and_then(|p| p.get_slot(id as SlotId));

        // Sticky leaders within the base quota first, then within the extras.
        for within_base in [true, false] {
            for (id, leader) in leaders.iter_mut().enumerate() {
                if leader.is_some() {
                    continue;
                }
                let Some(prev) = prev_slot(id) else { continue };
                let fits = match quota.count(&prev.leader) {
                    Some(c) if within_base => c < quota.base,
                    Some(_) => quota.can_take(&prev.leader),
                    None => false,
                };
                if fits {
                    quota.take(&prev.leader);
                    *leader = Some(prev.leader.clone());
                }
            }
        }

        // Fill the rest, promoting a previous follower where possible.
        for (id, leader) in leaders.iter_mut().enumerate() {
            if leader.is_some() {
                continue;
            }
            let prev_followers = prev_slot(id).map(|s| &s.followers);
            let chosen = nodes
                .iter()
                .filter(|node| quota.can_take(node))
                .min_by_key(|node| {
                    let promoted = prev_followers.is_some_and(|f| f.contains(*node));
                    (!promoted, quota.count(node).unwrap_or(usize::MAX), (*node).clone())
                })
                .cloned();
            if let Some(node) = chosen {
                quota.take(&node);
                *leader = Some(node);
            }
        }

        // The quota covers every slot, so the fallback is never taken.
        leaders
            .into_iter()
            .map(|leader| leader.unwrap_or_else(|| first.clone()))
            .collect()
    }

    fn assign_followers(
        &self,
        nodes: &BTreeSet<NodeId>,
        leaders: &[NodeId],
        previous: Option<&SlotTable>,
    ) -> Vec<BTreeSet<NodeId>> {
        let per_slot = self.replicas.min(nodes.len()) - 1;
        let total = leaders.len() * per_slot;
        let cap = total.div_ceil(nodes.len());
        let mut counts: BTreeMap<NodeId, usize> = nodes.iter().map(|n| (n.clone(), 0)).collect();

        leaders
            .iter()
            .enumerate()
            .map(|(id, leader)| {
                let mut followers = BTreeSet::new();
                if per_slot == 0 {
                    return followers;
                }

                // Previous owners that remain eligible, demoted leader included.
                if let Some(prev) = previous.and_then(|p| p.get_slot(id as SlotId)) {
                    for owner in prev.owners() {
                        if followers.len() == per_slot {
                            break;
                        }
                        if owner == *leader {
                            continue;
                        }
                        if let Some(count) = counts.get_mut(&owner) {
                            if *count < cap {
                                *count += 1;
                                followers.insert(owner);
                            }
                        }
                    }
                }

                while followers.len() < per_slot {
                    let next = counts
                        .iter()
                        .filter(|(node, _)| *node != leader && !followers.contains(*node))
                        .min_by_key(|(node, count)| (**count, (*node).clone()))
                        .map(|(node, _)| node.clone());
                    let Some(node) = next else { break };
                    if let Some(count) = counts.get_mut(&node) {
                        *count += 1;
                    }
                    followers.insert(node);
                }
                followers
            })
            .collect()
    }
}
