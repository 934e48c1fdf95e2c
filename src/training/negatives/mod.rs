// Hard-negative mining: near-miss documents a contrastive loss should push away


use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

use super::{PairType, TrainingPair};
use crate::corpus::Document;

const NEGATIVES_PER_RULE: usize = 2;
const BIO_THRESHOLD: usize = 3;

const BIO_INDICATORS: &[&str] = &[
    "bardeen",
    "cooper",
    "schrieffer",
    "kamerlingh",
    "onnes",
    "ginzburg",
    "landau",
    "josephson",
    "london",
    "nobel",
    "biography",
    "physicist",
    "professor",
    "discovered by",
    "invented by",
    "life of",
    "career",
    "born in",
    "died",
];

const GENERIC_PATTERNS: &[&str] = &[
    "what is",
    "how do",
    "explain",
    "introduction to",
    "basics of",
    "superconductivity",
    "superconductor",
    "superconducting materials",
    "superconducting properties",
    "how superconductors work",
];

const PERSON_INDICATORS: &[&str] = &[
    "bardeen",
    "cooper",
    "schrieffer",
    "josephson",
    "ginzburg",
    "landau",
    "onnes",
    "kamerlingh",
    "nobel prize",
    "who discovered",
    "who invented",
    "physicist",
    "professor",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Material {
    Cuprate,
    /// Iron pnictides and other iron-based compounds
    Pnictide,
    Nickelate,
    MgB2,
    Ybco,
    Graphene,
    Organic,
}

impl Material {
    pub const ALL: [Self; 7] = [
        Self::Cuprate,
        Self::Pnictide,
        Self::Nickelate,
        Self::MgB2,
        Self::Ybco,
        Self::Graphene,
        Self::Organic,
    ];

    /// Whether a lowercased document (text, title) discusses this material
    fn in_document(self, text: &str, title: &str) -> bool {
        match self {
            Self::Cuprate => text.contains("cuprate") || title.contains("cuprate"),
            Self::Pnictide => {
                text.contains("pnictide") || text.contains("iron-based") || text.contains("iron pnictide")
            }
            Self::Nickelate => text.contains("nickelate") || title.contains("nickelate"),
            Self::MgB2 => text.contains("mgb2") || text.contains("magnesium diboride"),
            Self::Ybco => text.contains("ybco") || text.contains("yttrium barium"),
            Self::Graphene => text.contains("graphene") || title.contains("graphene"),
            Self::Organic => text.contains("organic superconductor") || text.contains("fullerene"),
        }
    }
}

/// Three or more biographical indicators in the title or text
#[inline]
pub fn is_biographical(document: &Document) -> bool {
    let text = document.text.to_lowercase();
    let title = document.title.to_lowercase();
    BIO_INDICATORS
        .iter()
        .filter(|indicator| text.contains(*indicator) || title.contains(*indicator))
        .count()
        >= BIO_THRESHOLD
}

/// Every material a document discusses
#[inline]
pub fn document_materials(document: &Document) -> Vec<Material> {
    let text = document.text.to_lowercase();
    let title = document.title.to_lowercase();
    Material::ALL
        .into_iter()
        .filter(|material| material.in_document(&text, &title))
        .collect()
}

#[inline]
pub fn is_generic_query(query: &str) -> bool {
    let query = query.to_lowercase();
    GENERIC_PATTERNS.iter().any(|pattern| query.contains(pattern))
}

#[inline]
pub fn is_person_specific_query(query: &str) -> bool {
    let query = query.to_lowercase();
    PERSON_INDICATORS.iter().any(|indicator| query.contains(indicator))
}

/// The first material a query names
#[inline]
pub fn material_from_query(query: &str) -> Option<Material> {
    let query = query.to_lowercase();
    if query.contains("cuprate") {
        Some(Material::Cuprate)
    } else if query.contains("pnictide") || query.contains("iron-based") {
        Some(Material::Pnictide)
    } else if query.contains("nickelate") {
        Some(Material::Nickelate)
    } else if query.contains("mgb2") || query.contains("magnesium diboride") {
        Some(Material::MgB2)
    } else if query.contains("ybco") {
        Some(Material::Ybco)
    } else if query.contains("graphene") {
        Some(Material::Graphene)
    } else if query.contains("organic") || query.contains("fullerene") {
        Some(Material::Organic)
    } else {
        None
    }
}

/// Corpus partitions used to pick negatives. Ids are kept sorted so seeded
/// sampling is reproducible.
#[derive(Debug)]
pub struct NegativeMiner<'a> {
    documents: HashMap<&'a str, &'a Document>,
    biographical: BTreeSet<&'a str>,
    theory: BTreeSet<&'a str>,
    materials: BTreeMap<Material, BTreeSet<&'a str>>,
}

impl<'a> NegativeMiner<'a> {
    #[inline]
    pub fn new(documents: &'a [Document]) -> Self {
        let mut biographical = BTreeSet::new();
        let mut theory = BTreeSet::new();
        let mut materials: BTreeMap<Material, BTreeSet<&str>> = BTreeMap::new();

        for document in documents {
            let id = document.id.as_str();
            if is_biographical(document) {
                biographical.insert(id);
            } else {
                theory.insert(id);
            }
            for material in document_materials(document) {
                materials.entry(material).or_default().insert(id);
            }
        }

        info!(
            "{} biographical documents, {} theory documents",
            biographical.len(),
            theory.len()
        );
        for (material, ids) in &materials {
            debug!("{:?}: {} documents", material, ids.len());
        }

        Self {
            documents: documents.iter().map(|doc| (doc.id.as_str(), doc)).collect(),
            biographical,
            theory,
            materials,
        }
    }

    /// Negatives for one positive: generic→bio or person→theory, plus material mismatch
    #[inline]
    pub fn negatives_for(&self, positive: &TrainingPair, rng: &mut StdRng) -> Vec<TrainingPair> {
        let mut negatives = Vec::new();
        let exclude = positive.doc_id.as_str();

        if is_generic_query(&positive.query_text) {
            self.sample_into(
                &mut negatives,
                positive,
                self.biographical.iter().copied(),
                exclude,
                PairType::HardNegativeGenericToBio,
                rng,
            );
        } else if is_person_specific_query(&positive.query_text) {
            self.sample_into(
                &mut negatives,
                positive,
                self.theory.iter().copied(),
                exclude,
                PairType::HardNegativePersonToTheory,
                rng,
            );
        }

        if let Some(material) = material_from_query(&positive.query_text) {
            let same_material = self.materials.get(&material);
            let others: BTreeSet<&str> = self
                .materials
                .iter()
                .filter(|(other, _)| **other != material)
                .flat_map(|(_, ids)| ids.iter().copied())
                .filter(|id| same_material.is_none_or(|same| !same.contains(id)))
                .collect();
            self.sample_into(
                &mut negatives,
                positive,
                others.into_iter(),
                exclude,
                PairType::HardNegativeMaterialMismatch,
                rng,
            );
        }

        negatives
    }

    fn sample_into(
        &self,
        negatives: &mut Vec<TrainingPair>,
        positive: &TrainingPair,
        candidates: impl Iterator<Item = &'a str>,
        exclude: &str,
        pair_type: PairType,
        rng: &mut StdRng,
    ) {
        let candidates: Vec<&str> = candidates.filter(|id| *id != exclude).collect();
        for id in candidates.choose_multiple(rng, NEGATIVES_PER_RULE) {
            if let Some(document) = self.documents.get(id) {
                negatives.push(TrainingPair::negative(positive, document, pair_type));
            }
        }
    }
}

/// Each positive followed by its mined negatives, sampled with a seeded RNG
#[inline]
pub fn mine_hard_negatives(
    positives: &[TrainingPair],
    documents: &[Document],
    seed: u64,
) -> Vec<TrainingPair> {
    let miner = NegativeMiner::new(documents);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut pairs = Vec::with_capacity(positives.len() * 2);
    let mut mined = 0;

    for positive in positives {
        pairs.push(positive.clone());
        if !positive.is_positive() {
            continue;
        }
        let negatives = miner.negatives_for(positive, &mut rng);
        mined += negatives.len();
        pairs.extend(negatives);
    }

    info!("Mined {} hard negatives for {} pairs", mined, positives.len());
    pairs
}

/// Drop positives that pair a generic query with a biographical document
#[inline]
pub fn remove_generic_bio_positives(
    pairs: Vec<TrainingPair>,
    documents: &[Document],
) -> Vec<TrainingPair> {
    let biographical: BTreeSet<&str> = documents
        .iter()
        .filter(|doc| is_biographical(doc))
        .map(|doc| doc.id.as_str())
        .collect();

    pairs
        .into_iter()
        .filter(|pair| {
            !(pair.is_positive()
                && is_generic_query(&pair.query_text)
                && biographical.contains(pair.doc_id.as_str()))
        })
        .collect()
}
