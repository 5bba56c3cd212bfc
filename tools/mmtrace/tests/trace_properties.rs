//! Property-based tests for trace parsing and replay

use proptest::prelude::*;

use mmtrace::*;
use softmmu::{Access, FaultCause, Policy};

fn op_line() -> impl Strategy<Value = (bool, usize, Option<usize>, bool)> {
    (any::<bool>(), 0usize..16, prop::option::of(0usize..4096), any::<bool>())
}

fn render((write, page, offset, hex): &(bool, usize, Option<usize>, bool)) -> String {
    let kind = if *write { "w" } else { "r" };
    let num = |n: usize| if *hex { format!("{:#x}", n) } else { n.to_string() };
    match offset {
        Some(off) => format!("{} {}+{}", kind, num(*page), num(*off)),
        None => format!("{} {}", kind, num(*page)),
    }
}

proptest! {
    /// The parser never panics, whatever the input
    #[test]
    fn parse_arbitrary_text(src in "\\PC{0,200}") {
        let _ = parse_trace(&src);
    }

    /// Every generated line becomes exactly one access, comments and blanks none
    #[test]
    fn parse_generated_lines(lines in prop::collection::vec(op_line(), 0..50)) {
        let mut src = String::from("# header\n\n");
        for line in &lines {
            src.push_str(&render(line));
            src.push_str("   # note\n");
        }

        let ops = parse_trace(&src).unwrap();
        prop_assert_eq!(ops.len(), lines.len());
        for (op, (write, page, offset, _)) in ops.iter().zip(&lines) {
            let access = if *write { Access::Write } else { Access::Read };
            prop_assert_eq!(op.access, access);
            prop_assert_eq!(op.page, *page);
            prop_assert_eq!(op.offset, offset.unwrap_or(0));
        }
    }

    /// Counters agree with the records a replay prints
    #[test]
    fn stats_match_records(
        lines in prop::collection::vec(op_line(), 0..100),
        third_chance in any::<bool>(),
        frames in 1usize..6,
    ) {
        let src: Vec<_> = lines.iter().map(render).collect();
        let ops = parse_trace(&src.join("\n")).unwrap();
        let config = TraceConfig {
            policy: if third_chance { Policy::ThirdChance } else { Policy::Fifo },
            frames,
            ..Default::default()
        };

        let report = simulate(&config, &ops).unwrap();
        let count = |cause| report.records.iter().filter(|r| r.cause == cause).count() as u64;
        prop_assert_eq!(report.stats.misses, count(FaultCause::Miss));
        prop_assert_eq!(report.stats.first_writes, count(FaultCause::FirstWrite));
        prop_assert_eq!(report.stats.reacquires, count(FaultCause::ReferenceReacquire));
        prop_assert_eq!(
            report.stats.evictions,
            report.records.iter().filter(|r| r.evicted_page.is_some()).count() as u64
        );
        prop_assert!(report.stats.faults >= report.records.len() as u64);
    }
}
