use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};

use crate::common::{DbError, PageId, RecordId, Result, SlotId, TransactionId};
use crate::tuple::{Schema, Tuple};

/// Heap page layout:
///
/// ```text
/// +-----------------------+
/// | Slot bitmap           |  ceil(num_slots / 8) bytes
/// +-----------------------+
/// | [slot 0]              |  tuple_size bytes each
/// | [slot 1]              |
/// | ...                   |
/// | [slot num_slots - 1]  |
/// +-----------------------+
/// | zero padding          |  up to page_size
/// +-----------------------+
/// ```
///
/// Bit `i` of the bitmap lives in byte `i / 8` at position `i % 8` (least
/// significant bit first); a set bit means slot `i` holds a tuple. Empty
/// slots are written as zeros, so a page of all zero bytes is a valid empty
/// page.
#[derive(Debug, Clone)]
pub struct HeapPage {
    /// Identity of this page
    id: PageId,
    /// Layout of every tuple on the page
    schema: Arc<Schema>,
    /// Serialized size of the page
    page_size: usize,
    /// One entry per slot; `None` marks a free slot
    slots: Vec<Option<Tuple>>,
    /// Transaction that last modified the page since it was loaded or flushed
    dirtied_by: Option<TransactionId>,
}

/// Largest slot count a `SlotId` can address.
pub const MAX_SLOTS_PER_PAGE: usize = u16::MAX as usize + 1;

/// Number of tuple slots a page can hold: each slot costs `tuple_size`
/// bytes plus one bitmap bit.
pub fn slots_per_page(page_size: usize, schema: &Schema) -> usize {
    (page_size * 8) / (schema.tuple_size() * 8 + 1)
}

fn slot_id(index: usize, page_size: usize) -> Result<SlotId> {
    u16::try_from(index)
        .map(SlotId::new)
        .map_err(|_| DbError::TooManySlots {
            num_slots: index + 1,
            page_size,
        })
}

/// Size in bytes of the slot bitmap.
pub fn header_size(num_slots: usize) -> usize {
    num_slots.div_ceil(8)
}

/// Returns the on-disk image of an empty page.
pub fn empty_page_data(page_size: usize) -> Vec<u8> {
    vec![0u8; page_size]
}

impl HeapPage {
    /// Creates an empty page.
    pub fn empty(id: PageId, schema: Arc<Schema>, page_size: usize) -> Self {
        let num_slots = slots_per_page(page_size, &schema);
        Self {
            id,
            schema,
            page_size,
            slots: vec![None; num_slots],
            dirtied_by: None,
        }
    }

    /// Parses a page image. Every stored tuple gets its `RecordId` set.
    pub fn from_bytes(
        id: PageId,
        schema: Arc<Schema>,
        page_size: usize,
        data: &[u8],
    ) -> Result<Self> {
        if data.len() != page_size {
            return Err(DbError::CorruptedPage {
                page_id: id,
                reason: format!("expected {} bytes, got {}", page_size, data.len()),
            });
        }

        let num_slots = slots_per_page(page_size, &schema);
        let header_len = header_size(num_slots);
        let tuple_size = schema.tuple_size();
        let (header, body) = data.split_at(header_len);

        let mut slots = Vec::with_capacity(num_slots);
        for i in 0..num_slots {
            if header[i / 8] & (1 << (i % 8)) == 0 {
                slots.push(None);
                continue;
            }

            let mut raw = &body[i * tuple_size..(i + 1) * tuple_size];
            let mut tuple = Tuple::deserialize(Arc::clone(&schema), &mut raw).ok_or_else(|| {
                DbError::CorruptedPage {
                    page_id: id,
                    reason: format!("slot {} does not hold a valid tuple", i),
                }
            })?;
            tuple.set_record_id(Some(RecordId::new(id, slot_id(i, page_size)?)));
            slots.push(Some(tuple));
        }

        Ok(Self {
            id,
            schema,
            page_size,
            slots,
            dirtied_by: None,
        })
    }

    /// Serializes the page into exactly `page_size` bytes.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut header = vec![0u8; header_size(self.slots.len())];
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.is_some() {
                header[i / 8] |= 1 << (i % 8);
            }
        }

        let mut buf = BytesMut::with_capacity(self.page_size);
        buf.put_slice(&header);
        for slot in &self.slots {
            match slot {
                Some(tuple) => tuple.serialize(&mut buf)?,
                None => buf.put_bytes(0, self.schema.tuple_size()),
            }
        }
        buf.put_bytes(0, self.page_size - buf.len());

        Ok(buf.freeze())
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn num_empty_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }

    pub fn is_slot_used(&self, slot: SlotId) -> bool {
        matches!(self.slots.get(slot.as_usize()), Some(Some(_)))
    }

    /// Returns the tuple in `slot`, if any.
    pub fn tuple(&self, slot: SlotId) -> Option<&Tuple> {
        self.slots.get(slot.as_usize()).and_then(Option::as_ref)
    }

    /// Places `tuple` in the first free slot and records its new location
    /// on both the stored copy and the caller's tuple.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> Result<RecordId> {
        if **tuple.schema() != *self.schema {
            return Err(DbError::SchemaMismatch);
        }

        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(DbError::PageFull(self.id))?;

        let record_id = RecordId::new(self.id, slot_id(index, self.page_size)?);
        tuple.set_record_id(Some(record_id));
        self.slots[index] = Some(tuple.clone());
        Ok(record_id)
    }

    /// Frees the slot named by the tuple's `RecordId`.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        let record_id = tuple.record_id().ok_or(DbError::TupleNotStored)?;
        if record_id.page_id != self.id || !self.is_slot_used(record_id.slot_id) {
            return Err(DbError::SlotNotOccupied(record_id));
        }

        self.slots[record_id.slot_id.as_usize()] = None;
        Ok(())
    }

    /// Iterates over the stored tuples in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Sets or clears the dirty owner.
    pub fn mark_dirty(&mut self, tid: Option<TransactionId>) {
        self.dirtied_by = tid;
    }

    /// Returns the transaction that dirtied this page, or None if clean.
    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirtied_by
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TableId;
    use crate::tuple::{DataType, TupleBuilder};

    const PAGE: usize = 64;

    fn schema() -> Arc<Schema> {
        // 4 + (2 + 12) = 18 bytes per tuple
        Schema::builder()
            .column("id", DataType::Integer)
            .column("name", DataType::Char(12))
            .build_arc()
    }

    fn pid(n: u32) -> PageId {
        PageId::new(TableId(7), n)
    }

    fn tuple(schema: &Arc<Schema>, id: i32, name: &str) -> Tuple {
        TupleBuilder::new(Arc::clone(schema))
            .value(id)
            .value(name)
            .build()
            .unwrap()
    }

    #[test]
    fn test_slot_math() {
        let schema = schema();
        // floor(512 / 145) = 3
        assert_eq!(slots_per_page(PAGE, &schema), 3);
        assert_eq!(header_size(3), 1);
        assert_eq!(header_size(8), 1);
        assert_eq!(header_size(9), 2);

        let wide = Schema::from_types(&[DataType::Integer]);
        // floor(32768 / 33) = 992
        assert_eq!(slots_per_page(4096, &wide), 992);
        assert_eq!(header_size(992), 124);
    }

    #[test]
    fn test_zero_page_is_empty() {
        let schema = schema();
        let page = HeapPage::from_bytes(pid(0), schema, PAGE, &empty_page_data(PAGE)).unwrap();
        assert_eq!(page.num_slots(), 3);
        assert_eq!(page.num_empty_slots(), 3);
        assert_eq!(page.iter().count(), 0);
        assert_eq!(page.is_dirty(), None);
    }

    #[test]
    fn test_insert_fills_first_free_slot() {
        let schema = schema();
        let mut page = HeapPage::empty(pid(2), Arc::clone(&schema), PAGE);

        let mut a = tuple(&schema, 1, "a");
        let mut b = tuple(&schema, 2, "b");
        let rid_a = page.insert_tuple(&mut a).unwrap();
        let rid_b = page.insert_tuple(&mut b).unwrap();

        assert_eq!(rid_a.slot_id, SlotId::new(0));
        assert_eq!(rid_b.slot_id, SlotId::new(1));
        assert_eq!(a.record_id(), Some(rid_a));
        assert_eq!(page.tuple(rid_b.slot_id).unwrap().record_id(), Some(rid_b));

        page.delete_tuple(&a).unwrap();
        let mut c = tuple(&schema, 3, "c");
        assert_eq!(page.insert_tuple(&mut c).unwrap().slot_id, SlotId::new(0));
    }

    #[test]
    fn test_insert_into_full_page() {
        let schema = schema();
        let mut page = HeapPage::empty(pid(0), Arc::clone(&schema), PAGE);
        for i in 0..3 {
            page.insert_tuple(&mut tuple(&schema, i, "x")).unwrap();
        }
        let err = page.insert_tuple(&mut tuple(&schema, 9, "y")).unwrap_err();
        assert!(matches!(err, DbError::PageFull(p) if p == pid(0)));
    }

    #[test]
    fn test_insert_rejects_other_schema() {
        let mut page = HeapPage::empty(pid(0), schema(), PAGE);
        let other = Schema::from_types(&[DataType::Integer]);
        let mut t = Tuple::new(Arc::new(other), vec![5.into()]).unwrap();
        assert!(matches!(
            page.insert_tuple(&mut t),
            Err(DbError::SchemaMismatch)
        ));
    }

    #[test]
    fn test_delete_errors() {
        let schema = schema();
        let mut page = HeapPage::empty(pid(1), Arc::clone(&schema), PAGE);

        let unstored = tuple(&schema, 1, "a");
        assert!(matches!(
            page.delete_tuple(&unstored),
            Err(DbError::TupleNotStored)
        ));

        let mut t = tuple(&schema, 1, "a");
        page.insert_tuple(&mut t).unwrap();
        page.delete_tuple(&t).unwrap();
        assert!(matches!(
            page.delete_tuple(&t),
            Err(DbError::SlotNotOccupied(_))
        ));

        let mut elsewhere = tuple(&schema, 2, "b");
        elsewhere.set_record_id(Some(RecordId::new(pid(9), SlotId::new(0))));
        assert!(matches!(
            page.delete_tuple(&elsewhere),
            Err(DbError::SlotNotOccupied(_))
        ));
    }

    #[test]
    fn test_serialized_layout() {
        let schema = schema();
        let mut page = HeapPage::empty(pid(0), Arc::clone(&schema), PAGE);
        let mut a = tuple(&schema, 1, "a");
        let mut b = tuple(&schema, 2, "bb");
        page.insert_tuple(&mut a).unwrap();
        page.insert_tuple(&mut b).unwrap();
        page.delete_tuple(&a).unwrap();

        let bytes = page.to_bytes().unwrap();
        assert_eq!(bytes.len(), PAGE);
        // Only slot 1 is occupied
        assert_eq!(bytes[0], 0b0000_0010);
        // Slot 0 is zeroed
        assert!(bytes[1..19].iter().all(|&b| b == 0));
        // Slot 1 starts with id = 2
        assert_eq!(&bytes[19..23], &2i32.to_le_bytes());

        let parsed = HeapPage::from_bytes(pid(0), schema, PAGE, &bytes).unwrap();
        assert_eq!(parsed.num_empty_slots(), 2);
        let stored: Vec<_> = parsed.iter().collect();
        assert_eq!(stored, vec![&b]);
        assert_eq!(
            stored[0].record_id(),
            Some(RecordId::new(pid(0), SlotId::new(1)))
        );
        assert_eq!(parsed.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_from_bytes_rejects_bad_input() {
        let schema = schema();
        let short = vec![0u8; PAGE - 1];
        assert!(matches!(
            HeapPage::from_bytes(pid(0), Arc::clone(&schema), PAGE, &short),
            Err(DbError::CorruptedPage { .. })
        ));

        // Slot 0 marked used, but its string length exceeds the column width
        let mut data = empty_page_data(PAGE);
        data[0] = 1;
        data[1 + 4] = 0xFF;
        assert!(matches!(
            HeapPage::from_bytes(pid(0), schema, PAGE, &data),
            Err(DbError::CorruptedPage { .. })
        ));
    }

    #[test]
    fn test_insert_beyond_addressable_slots_fails() {
        let narrow = Arc::new(Schema::from_types(&[DataType::Integer]));
        let mut page = HeapPage::empty(pid(0), Arc::clone(&narrow), 300_000);
        assert!(page.num_slots() > MAX_SLOTS_PER_PAGE);

        let first = TupleBuilder::new(Arc::clone(&narrow)).value(1).build().unwrap();
        for slot in page.slots.iter_mut().take(MAX_SLOTS_PER_PAGE) {
            *slot = Some(first.clone());
        }

        let mut next = TupleBuilder::new(narrow).value(2).build().unwrap();
        assert!(matches!(
            page.insert_tuple(&mut next),
            Err(DbError::TooManySlots { .. })
        ));
        assert_eq!(next.record_id(), None);
        assert!(page.is_slot_used(SlotId::new(0)));
    }

    #[test]
    fn test_dirty_tracking() {
        let mut page = HeapPage::empty(pid(0), schema(), PAGE);
        let tid = TransactionId(11);
        page.mark_dirty(Some(tid));
        assert_eq!(page.is_dirty(), Some(tid));
        page.mark_dirty(None);
        assert_eq!(page.is_dirty(), None);
    }
}
