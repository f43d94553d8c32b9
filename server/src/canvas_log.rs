use protocol::Draw;

// Ordered history of accepted draw operations since the last reset,
// replayed to users as they are approved
#[derive(Debug, Default)]
pub struct CanvasLog {
    ops: Vec<Draw>,
}

impl CanvasLog {
    pub fn new() -> Self {
        CanvasLog { ops: Vec::new() }
    }

    pub fn append(&mut self, op: Draw) {
        self.ops.push(op);
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Draw> {
        self.ops.iter()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
