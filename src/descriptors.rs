//! Asset descriptor classification and the descriptor cache
//!
//! The cache is rebuilt wholesale from every successful description fetch and
//! replaced behind an `Arc`; it is never edited in place. Rigid bodies keep the
//! order the server declared them in, because frame extraction pairs the
//! `n`th cached rigid body with the `n`th rigid body sample of each frame.
//! That pairing is positional, not keyed by id, and relies on the server
//! streaming bodies in description order.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::transport::RawDescriptor;
use crate::types::FrameSample;
use crate::{Result, TrackerError};

/// Status line logged for descriptors with an unsupported tag
pub const INVALID_DATA_SET: &str = "Error: Invalid Data Set";

/// Known descriptor type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum DescriptorType {
    MarkerSet = 0,
    RigidBody = 1,
    Skeleton = 2,
    ForcePlate = 3,
}

impl TryFrom<i32> for DescriptorType {
    type Error = TrackerError;

    fn try_from(type_tag: i32) -> Result<Self> {
        match type_tag {
            0 => Ok(DescriptorType::MarkerSet),
            1 => Ok(DescriptorType::RigidBody),
            2 => Ok(DescriptorType::Skeleton),
            3 => Ok(DescriptorType::ForcePlate),
            _ => Err(TrackerError::UnknownDescriptorType { type_tag }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerSetDescriptor {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RigidBodyDescriptor {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkeletonDescriptor {
    pub id: i32,
    pub name: String,
    pub bones: Vec<RigidBodyDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForcePlateDescriptor {
    pub id: i32,
    pub serial: String,
    pub channel_names: Vec<String>,
}

/// A classified asset description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetDescriptor {
    MarkerSet(MarkerSetDescriptor),
    RigidBody(RigidBodyDescriptor),
    Skeleton(SkeletonDescriptor),
    ForcePlate(ForcePlateDescriptor),
}

impl AssetDescriptor {
    /// Classify a raw descriptor by its type tag
    pub fn classify(raw: RawDescriptor) -> Result<Self> {
        let kind = DescriptorType::try_from(raw.type_tag)?;
        Ok(match kind {
            DescriptorType::MarkerSet => {
                AssetDescriptor::MarkerSet(MarkerSetDescriptor { name: raw.name })
            }
            DescriptorType::RigidBody => {
                AssetDescriptor::RigidBody(RigidBodyDescriptor { id: raw.id, name: raw.name })
            }
            DescriptorType::Skeleton => AssetDescriptor::Skeleton(SkeletonDescriptor {
                id: raw.id,
                name: raw.name,
                bones: raw
                    .bones
                    .into_iter()
                    .map(|bone| RigidBodyDescriptor { id: bone.id, name: bone.name })
                    .collect(),
            }),
            DescriptorType::ForcePlate => AssetDescriptor::ForcePlate(ForcePlateDescriptor {
                id: raw.id,
                serial: raw.serial,
                channel_names: raw.channel_names,
            }),
        })
    }

    /// Status line announcing this descriptor
    pub fn summary(&self) -> String {
        match self {
            AssetDescriptor::MarkerSet(set) => format!("MarkerSet ({})", set.name),
            AssetDescriptor::RigidBody(body) => format!("RigidBody ({})", body.name),
            AssetDescriptor::Skeleton(skeleton) => {
                let bones: Vec<&str> = skeleton.bones.iter().map(|b| b.name.as_str()).collect();
                format!("Skeleton ({}, Bones: {})", skeleton.name, bones.join(", "))
            }
            AssetDescriptor::ForcePlate(plate) => format!(
                "ForcePlate ({}, Channels: {})",
                plate.serial,
                plate.channel_names.join(", ")
            ),
        }
    }
}

/// Split a packed bone id into `(skeleton id, bone id)`.
///
/// Frame data packs the skeleton id into the high 16 bits and the bone's
/// rigid-body id into the low 16 bits.
pub fn decode_bone_id(packed: i32) -> (i32, i32) {
    ((packed >> 16) & 0xFFFF, packed & 0xFFFF)
}

/// Typed registry of the assets announced by one description fetch.
#[derive(Debug, Clone, Default)]
pub struct DescriptorCache {
    epoch: u64,
    marker_sets: Vec<MarkerSetDescriptor>,
    rigid_bodies: Vec<RigidBodyDescriptor>,
    skeletons: Vec<SkeletonDescriptor>,
    force_plates: Vec<ForcePlateDescriptor>,
    bones: HashMap<(i32, i32), RigidBodyDescriptor>,
}

impl DescriptorCache {
    /// An empty cache for a connection epoch
    pub fn empty(epoch: u64) -> Self {
        Self { epoch, ..Self::default() }
    }

    /// Classify `raw` descriptors into a fresh cache.
    ///
    /// Unknown tags are dropped; every descriptor, valid or not, adds one line
    /// to `notes` after a leading count line.
    pub fn build(epoch: u64, raw: Vec<RawDescriptor>, notes: &mut Vec<String>) -> Self {
        let mut cache = Self::empty(epoch);
        notes.push(format!("Total {} data sets in the capture:", raw.len()));

        for descriptor in raw {
            match AssetDescriptor::classify(descriptor) {
                Ok(asset) => {
                    notes.push(asset.summary());
                    cache.insert(asset);
                }
                Err(e) => {
                    warn!("Dropping descriptor: {}", e);
                    notes.push(INVALID_DATA_SET.to_string());
                }
            }
        }

        debug!(
            epoch,
            marker_sets = cache.marker_sets.len(),
            rigid_bodies = cache.rigid_bodies.len(),
            skeletons = cache.skeletons.len(),
            force_plates = cache.force_plates.len(),
            "Built descriptor cache"
        );
        cache
    }

    fn insert(&mut self, asset: AssetDescriptor) {
        match asset {
            AssetDescriptor::MarkerSet(set) => self.marker_sets.push(set),
            AssetDescriptor::RigidBody(body) => self.rigid_bodies.push(body),
            AssetDescriptor::Skeleton(skeleton) => {
                for bone in &skeleton.bones {
                    self.bones.insert((skeleton.id, bone.id), bone.clone());
                }
                self.skeletons.push(skeleton);
            }
            AssetDescriptor::ForcePlate(plate) => self.force_plates.push(plate),
        }
    }

    /// Connection epoch this cache belongs to
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn marker_sets(&self) -> &[MarkerSetDescriptor] {
        &self.marker_sets
    }

    /// Rigid bodies in declaration order
    pub fn rigid_bodies(&self) -> &[RigidBodyDescriptor] {
        &self.rigid_bodies
    }

    pub fn skeletons(&self) -> &[SkeletonDescriptor] {
        &self.skeletons
    }

    pub fn force_plates(&self) -> &[ForcePlateDescriptor] {
        &self.force_plates
    }

    /// Look up a skeleton bone by its packed frame id
    pub fn bone(&self, packed_id: i32) -> Option<&RigidBodyDescriptor> {
        self.bones.get(&decode_bone_id(packed_id))
    }

    pub fn is_empty(&self) -> bool {
        self.marker_sets.is_empty()
            && self.rigid_bodies.is_empty()
            && self.skeletons.is_empty()
            && self.force_plates.is_empty()
    }

    /// Whether `frame` declares a different asset list than this cache holds
    pub fn diverges_from(&self, frame: &FrameSample) -> bool {
        frame.tracking_models_changed
            || frame.rigid_body_count() != self.rigid_bodies.len()
            || frame.skeleton_count != self.skeletons.len()
            || frame.force_plate_count != self.force_plates.len()
    }
}
