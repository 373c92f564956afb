//! # redb-backed Triplet Storage
//!
//! Disk-backed knowledge graph built on the redb embedded database:
//! ACID transactions, crash-safe copy-on-write B-trees and concurrent
//! readers. Names map to dense ids that survive reopening, triplets keep
//! their insertion order through a sequence number.

use crate::construction::{ConstructionReport, Constructor};
use crate::graph::{KnowledgeGraph, TripletStore, validate_features};
use crate::primitives::MAX_TRIPLETS;
use crate::{EntityId, GraphragError, RawTriplet, RelationId, Triplet};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::collections::BTreeMap;
use std::path::Path;

/// Entity name -> EntityId
const ENTITIES: TableDefinition<&str, u64> = TableDefinition::new("entities");

/// Relation name -> RelationId
const RELATIONS: TableDefinition<&str, u64> = TableDefinition::new("relations");

/// (head, relation, tail) -> insertion sequence number
const TRIPLETS: TableDefinition<(u64, u64, u64), u64> = TableDefinition::new("triplets");

/// RelationId -> postcard-serialized `Vec<f32>`
const RELATION_FEATURES: TableDefinition<u64, &[u8]> = TableDefinition::new("relation_features");

/// key -> u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_SEQUENCE: &str = "next_triplet_sequence";

fn io_err(e: impl std::fmt::Display) -> GraphragError {
    GraphragError::IoError(e.to_string())
}

/// A disk-backed triplet store using redb.
///
/// Name lookups are served from in-memory caches loaded on open.
pub struct RedbStore {
    db: Database,
    entity_cache: BTreeMap<String, EntityId>,
    relation_cache: BTreeMap<String, RelationId>,
    next_sequence: u64,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("entities", &self.entity_cache.len())
            .field("relations", &self.relation_cache.len())
            .field("next_sequence", &self.next_sequence)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GraphragError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(ENTITIES).map_err(io_err)?;
            let _ = write_txn.open_table(RELATIONS).map_err(io_err)?;
            let _ = write_txn.open_table(TRIPLETS).map_err(io_err)?;
            let _ = write_txn.open_table(RELATION_FEATURES).map_err(io_err)?;
            let _ = write_txn.open_table(METADATA).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        let read_txn = db.begin_read().map_err(io_err)?;

        let next_sequence = {
            let table = read_txn.open_table(METADATA).map_err(io_err)?;
            table
                .get(NEXT_SEQUENCE)
                .map_err(io_err)?
                .map(|v| v.value())
                .unwrap_or(0)
        };

        let entity_cache = {
            let table = read_txn.open_table(ENTITIES).map_err(io_err)?;
            let mut cache = BTreeMap::new();
            for entry in table.iter().map_err(io_err)? {
                let (key, value) = entry.map_err(io_err)?;
                cache.insert(key.value().to_string(), EntityId(value.value()));
            }
            cache
        };

        let relation_cache = {
            let table = read_txn.open_table(RELATIONS).map_err(io_err)?;
            let mut cache = BTreeMap::new();
            for entry in table.iter().map_err(io_err)? {
                let (key, value) = entry.map_err(io_err)?;
                cache.insert(key.value().to_string(), RelationId(value.value()));
            }
            cache
        };

        Ok(Self {
            db,
            entity_cache,
            relation_cache,
            next_sequence,
        })
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), GraphragError> {
        self.db.compact().map_err(io_err)?;
        Ok(())
    }

    /// Ingest a batch of raw triplets in a single ACID transaction.
    ///
    /// Every record is validated before the transaction opens; an invalid
    /// record rejects the whole batch.
    pub fn ingest_batch(&mut self, raws: &[RawTriplet]) -> Result<ConstructionReport, GraphragError> {
        if raws.len() > MAX_TRIPLETS {
            return Err(GraphragError::InvalidTriplet(format!(
                "Triplet count {} exceeds maximum {}",
                raws.len(),
                MAX_TRIPLETS
            )));
        }
        let normalized = raws
            .iter()
            .map(Constructor::normalize)
            .collect::<Result<Vec<_>, _>>()?;

        let mut new_entities: BTreeMap<String, EntityId> = BTreeMap::new();
        let mut new_relations: BTreeMap<String, RelationId> = BTreeMap::new();
        let mut next_sequence = self.next_sequence;
        let mut report = ConstructionReport {
            triplets_seen: normalized.len(),
            ..ConstructionReport::default()
        };

        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut entity_table = write_txn.open_table(ENTITIES).map_err(io_err)?;
            let mut relation_table = write_txn.open_table(RELATIONS).map_err(io_err)?;
            let mut triplet_table = write_txn.open_table(TRIPLETS).map_err(io_err)?;
            let mut meta_table = write_txn.open_table(METADATA).map_err(io_err)?;

            for raw in &normalized {
                let mut resolve_entity = |name: &str| -> Result<EntityId, GraphragError> {
                    if let Some(&id) = self.entity_cache.get(name) {
                        return Ok(id);
                    }
                    if let Some(&id) = new_entities.get(name) {
                        return Ok(id);
                    }
                    let id = EntityId((self.entity_cache.len() + new_entities.len()) as u64);
                    entity_table.insert(name, id.0).map_err(io_err)?;
                    new_entities.insert(name.to_string(), id);
                    Ok(id)
                };
                let head = resolve_entity(&raw.head)?;
                let tail = resolve_entity(&raw.tail)?;

                let relation = match self
                    .relation_cache
                    .get(raw.relation.as_str())
                    .or_else(|| new_relations.get(raw.relation.as_str()))
                {
                    Some(&id) => id,
                    None => {
                        let id =
                            RelationId((self.relation_cache.len() + new_relations.len()) as u64);
                        relation_table
                            .insert(raw.relation.as_str(), id.0)
                            .map_err(io_err)?;
                        new_relations.insert(raw.relation.clone(), id);
                        id
                    }
                };

                let key = (head.0, relation.0, tail.0);
                if triplet_table.get(key).map_err(io_err)?.is_some() {
                    report.duplicates += 1;
                } else {
                    triplet_table.insert(key, next_sequence).map_err(io_err)?;
                    next_sequence = next_sequence.saturating_add(1);
                    report.triplets_added += 1;
                }
            }

            meta_table
                .insert(NEXT_SEQUENCE, next_sequence)
                .map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;

        // Update in-memory state only after successful commit.
        self.next_sequence = next_sequence;
        self.entity_cache.extend(new_entities);
        self.relation_cache.extend(new_relations);

        report.entities = self.entity_cache.len();
        report.relations = self.relation_cache.len();
        Ok(report)
    }

    /// Sort `(id, name)` pairs by id and check the ids are dense.
    fn ordered_names<'a>(
        pairs: impl Iterator<Item = (u64, &'a String)>,
        kind: &str,
    ) -> Result<Vec<String>, GraphragError> {
        let mut pairs: Vec<(u64, &String)> = pairs.collect();
        pairs.sort_unstable();
        for (expected, (id, _)) in pairs.iter().enumerate() {
            if *id != expected as u64 {
                return Err(GraphragError::DeserializationError(format!(
                    "{} ids are not dense: found {} at position {}",
                    kind, id, expected
                )));
            }
        }
        Ok(pairs.into_iter().map(|(_, name)| name.clone()).collect())
    }

    /// Materialise the whole store as an in-memory graph.
    ///
    /// Ids are preserved and triplets come back in insertion order.
    pub fn load_graph(&self) -> Result<KnowledgeGraph, GraphragError> {
        let mut graph = KnowledgeGraph::new();
        let entities = self.entity_cache.iter().map(|(name, id)| (id.0, name));
        for name in Self::ordered_names(entities, "entity")? {
            graph.insert_entity(&name)?;
        }
        let relations = self.relation_cache.iter().map(|(name, id)| (id.0, name));
        for name in Self::ordered_names(relations, "relation")? {
            graph.insert_relation(&name)?;
        }

        let read_txn = self.db.begin_read().map_err(io_err)?;

        let mut triplets = Vec::new();
        {
            let table = read_txn.open_table(TRIPLETS).map_err(io_err)?;
            for entry in table.iter().map_err(io_err)? {
                let (key, value) = entry.map_err(io_err)?;
                let (h, r, t) = key.value();
                triplets.push((value.value(), Triplet::new(EntityId(h), RelationId(r), EntityId(t))));
            }
        }
        triplets.sort_unstable_by_key(|(sequence, _)| *sequence);
        for (_, triplet) in triplets {
            graph.insert_triplet(triplet)?;
        }

        let table = read_txn.open_table(RELATION_FEATURES).map_err(io_err)?;
        for entry in table.iter().map_err(io_err)? {
            let (key, value) = entry.map_err(io_err)?;
            let features: Vec<f32> = postcard::from_bytes(value.value())
                .map_err(|e| GraphragError::DeserializationError(e.to_string()))?;
            graph.set_relation_features(RelationId(key.value()), features)?;
        }

        Ok(graph)
    }
}

// =============================================================================
// TRIPLETSTORE TRAIT IMPLEMENTATION
// =============================================================================

impl TripletStore for RedbStore {
    fn insert_entity(&mut self, name: &str) -> Result<EntityId, GraphragError> {
        if let Some(&id) = self.entity_cache.get(name) {
            return Ok(id);
        }
        let id = EntityId(self.entity_cache.len() as u64);
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = write_txn.open_table(ENTITIES).map_err(io_err)?;
            table.insert(name, id.0).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        self.entity_cache.insert(name.to_string(), id);
        Ok(id)
    }

    fn insert_relation(&mut self, name: &str) -> Result<RelationId, GraphragError> {
        if let Some(&id) = self.relation_cache.get(name) {
            return Ok(id);
        }
        let id = RelationId(self.relation_cache.len() as u64);
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = write_txn.open_table(RELATIONS).map_err(io_err)?;
            table.insert(name, id.0).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        self.relation_cache.insert(name.to_string(), id);
        Ok(id)
    }

    fn insert_triplet(&mut self, triplet: Triplet) -> Result<bool, GraphragError> {
        if triplet.head.index() >= self.entity_cache.len()
            || triplet.tail.index() >= self.entity_cache.len()
        {
            return Err(GraphragError::UnknownEntity(format!(
                "#{} or #{}",
                triplet.head.0, triplet.tail.0
            )));
        }
        if triplet.relation.index() >= self.relation_cache.len() {
            return Err(GraphragError::UnknownRelation(format!(
                "#{}",
                triplet.relation.0
            )));
        }

        let key = (triplet.head.0, triplet.relation.0, triplet.tail.0);
        let write_txn = self.db.begin_write().map_err(io_err)?;
        let added = {
            let mut table = write_txn.open_table(TRIPLETS).map_err(io_err)?;
            if table.get(key).map_err(io_err)?.is_some() {
                false
            } else {
                table.insert(key, self.next_sequence).map_err(io_err)?;
                let mut meta = write_txn.open_table(METADATA).map_err(io_err)?;
                meta.insert(NEXT_SEQUENCE, self.next_sequence.saturating_add(1))
                    .map_err(io_err)?;
                true
            }
        };
        write_txn.commit().map_err(io_err)?;
        if added {
            self.next_sequence = self.next_sequence.saturating_add(1);
        }
        Ok(added)
    }

    fn set_relation_features(
        &mut self,
        relation: RelationId,
        features: Vec<f32>,
    ) -> Result<(), GraphragError> {
        if relation.index() >= self.relation_cache.len() {
            return Err(GraphragError::UnknownRelation(format!("#{}", relation.0)));
        }
        validate_features(&features)?;
        let bytes = postcard::to_allocvec(&features)
            .map_err(|e| GraphragError::SerializationError(e.to_string()))?;

        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = write_txn.open_table(RELATION_FEATURES).map_err(io_err)?;
            table.insert(relation.0, bytes.as_slice()).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    fn entity_id(&self, name: &str) -> Option<EntityId> {
        self.entity_cache.get(name).copied()
    }

    fn relation_id(&self, name: &str) -> Option<RelationId> {
        self.relation_cache.get(name).copied()
    }

    fn entity_count(&self) -> Result<usize, GraphragError> {
        Ok(self.entity_cache.len())
    }

    fn relation_count(&self) -> Result<usize, GraphragError> {
        Ok(self.relation_cache.len())
    }

    fn triplet_count(&self) -> Result<usize, GraphragError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(TRIPLETS).map_err(io_err)?;
        Ok(table.len().map_err(io_err)? as usize)
    }
}

// =============================================================================
// TESTS
// =============================================================================
