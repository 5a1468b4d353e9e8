/// Counters of the paging activity since the creation of the [`crate::Vm`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VmStats {
    /// All calls to the fault handler, including fatal ones
    pub faults: usize,

    /// Faults that were fatal for the process
    pub fatal_faults: usize,

    /// Pending pages that got their initial content
    pub lazy_loads: usize,

    pub evictions: usize,
    pub swap_outs: usize,
    pub swap_ins: usize,

    /// Dirty file backed pages that were written back to their file
    pub write_backs: usize,

    pub stack_growths: usize,

    /// Frames that were handed out by the frame allocator
    pub frames_allocated: usize,
}

#[cfg(all(test, feature = "serde"))]
mod test {
    use super::VmStats;

    #[test]
    fn test_stats_json() {
        let stats = VmStats {
            faults: 3,
            evictions: 1,
            ..Default::default()
        };

        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"faults\":3"));
        assert_eq!(serde_json::from_str::<VmStats>(&json).unwrap(), stats);
    }
}
