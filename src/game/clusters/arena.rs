/// Handle of a cluster record in a [`ClusterArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterId(u32);

impl ClusterId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ClusterRecord {
    Root { size: u32 },
    Merged { into: ClusterId },
}

/// Union-find over cluster records, rebuilt every tick.
///
/// Root resolution is iterative with full path compression, so chains created
/// by a long row-major scan never recurse.
#[derive(Clone, Debug, Default)]
pub struct ClusterArena {
    records: Vec<ClusterRecord>,
}

impl ClusterArena {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn create(&mut self, size: u32) -> ClusterId {
        let id = ClusterId(self.records.len() as u32);
        self.records.push(ClusterRecord::Root { size });
        id
    }

    pub fn find(&mut self, id: ClusterId) -> ClusterId {
        let mut root = id;
        while let ClusterRecord::Merged { into } = self.records[root.index()] {
            root = into;
        }

        let mut current = id;
        while let ClusterRecord::Merged { into } = self.records[current.index()] {
            self.records[current.index()] = ClusterRecord::Merged { into: root };
            current = into;
        }
        root
    }

    /// Merge the clusters of `a` and `b`, returning the surviving root.
    pub fn union(&mut self, a: ClusterId, b: ClusterId) -> ClusterId {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return root_a;
        }
        let (keep, absorb) = if root_a.0 <= root_b.0 { (root_a, root_b) } else { (root_b, root_a) };
        let absorbed = self.root_size(absorb);
        self.records[absorb.index()] = ClusterRecord::Merged { into: keep };
        self.add_size(keep, absorbed);
        keep
    }

    pub fn add_size(&mut self, id: ClusterId, amount: u32) {
        let root = self.find(id);
        if let ClusterRecord::Root { size } = &mut self.records[root.index()] {
            *size += amount;
        }
    }

    pub fn size(&mut self, id: ClusterId) -> u32 {
        let root = self.find(id);
        self.root_size(root)
    }

    fn root_size(&self, root: ClusterId) -> u32 {
        match self.records[root.index()] {
            ClusterRecord::Root { size } => size,
            ClusterRecord::Merged { .. } => unreachable!("cluster {root:?} is not a root"),
        }
    }
}
