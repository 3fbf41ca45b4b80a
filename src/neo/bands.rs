use super::NeoRecord;

const FNV_OFFSET_BASIS: u32 = 2166136261;
const FNV_PRIME: u32 = 16777619;

/// 32-bit FNV-1a over the UTF-8 bytes of `key`.
///
/// Non-ASCII names hash differently from a UTF-16 code-unit implementation
/// (e.g. JavaScript `charCodeAt`); ASCII names hash the same in both.
pub fn fnv1a_hash(key: &str) -> u32 {
    key.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ byte as u32).wrapping_mul(FNV_PRIME)
    })
}

/// Where one object sits: its frequency band and its position among the
/// objects sharing that band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BandSlot {
    pub band: usize,
    pub slot: usize,
}

/// Band/slot for every object plus the band-clustered display order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BandAssignment {
    num_bands: usize,
    /// Indexed like the input records.
    slots: Vec<BandSlot>,
    /// Source indices grouped band by band, each group in source order.
    display_order: Vec<usize>,
    band_sizes: Vec<usize>,
}

impl BandAssignment {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn num_bands(&self) -> usize {
        self.num_bands
    }

    pub fn slots(&self) -> &[BandSlot] {
        &self.slots
    }

    pub fn get(&self, index: usize) -> Option<BandSlot> {
        self.slots.get(index).copied()
    }

    pub fn display_order(&self) -> &[usize] {
        &self.display_order
    }

    /// Number of objects sharing `band`.
    pub fn band_size(&self, band: usize) -> usize {
        self.band_sizes.get(band).copied().unwrap_or(0)
    }
}

/// Band for a single key. A band count of zero is treated as one band.
pub fn band_for(key: &str, num_bands: usize) -> usize {
    let num_bands = num_bands.max(1);
    (fnv1a_hash(key) as usize) % num_bands
}

/// Assign every record to a band and a stable slot inside it.
///
/// Bands come from hashing the record name (or its index when unnamed), so a
/// record's band never depends on the other records. Slots are handed out by
/// first grouping indices per band in source order and then walking the
/// groups band by band.
pub fn assign(records: &[NeoRecord], num_bands: usize) -> BandAssignment {
    let num_bands = num_bands.max(1);

    let mut groups: Vec<Vec<usize>> = vec![Vec::new(); num_bands];
    for (index, record) in records.iter().enumerate() {
        groups[band_for(&record.label(index), num_bands)].push(index);
    }

    let mut slots = vec![BandSlot { band: 0, slot: 0 }; records.len()];
    let mut display_order = Vec::with_capacity(records.len());
    for (band, members) in groups.iter().enumerate() {
        for (slot, &index) in members.iter().enumerate() {
            slots[index] = BandSlot { band, slot };
            display_order.push(index);
        }
    }

    BandAssignment {
        num_bands,
        slots,
        display_order,
        band_sizes: groups.iter().map(Vec::len).collect(),
    }
}
