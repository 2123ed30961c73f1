use ulink_object::{Archive, NameId, ObjectGraph, ObjectHandle};

use crate::error::{LinkError, LinkResult};
use crate::tables::{IndexMap, NameMap};

/// Serializes one export's payload with object references written as
/// package indices and names as name table slots.
pub(crate) struct PayloadWriter<'a> {
    graph: &'a ObjectGraph,
    names: &'a NameMap,
    indices: &'a IndexMap,
    buf: Vec<u8>,
    error: Option<LinkError>,
}

impl<'a> PayloadWriter<'a> {
    pub fn new(graph: &'a ObjectGraph, names: &'a NameMap, indices: &'a IndexMap) -> Self {
        Self {
            graph,
            names,
            indices,
            buf: Vec::new(),
            error: None,
        }
    }

    /// Serialize `object` and return its payload bytes.
    pub fn write(mut self, object: ObjectHandle) -> LinkResult<Vec<u8>> {
        let graph = self.graph;
        graph.serialize(object, &mut self);
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.buf),
        }
    }
}

impl Archive for PayloadWriter<'_> {
    fn serialize_object(&mut self, object: Option<ObjectHandle>) {
        let index = object.map(|h| self.indices.get(h)).unwrap_or_default();
        self.buf.extend_from_slice(&index.raw().to_be_bytes());
    }

    fn serialize_name(&mut self, name: NameId) {
        match self.names.lookup(name) {
            Some(slot) => self.buf.extend_from_slice(&slot.to_be_bytes()),
            None => {
                if self.error.is_none() {
                    let text = self.graph.names().resolve(name).to_string();
                    self.error = Some(LinkError::NameNotMapped(text));
                }
                self.buf.extend_from_slice(&0u32.to_be_bytes());
            }
        }
    }

    fn serialize_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }
}
