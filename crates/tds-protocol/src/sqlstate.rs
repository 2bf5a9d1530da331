//! Server error number to SQLSTATE mapping.
//!
//! The tables are immutable and sorted by error number so lookups are a
//! binary search. Keep them in ascending order when adding entries; the
//! `tables_are_sorted` test enforces it.

/// SQLSTATE reported for errors with no specific mapping.
pub const DEFAULT_ERROR_STATE: &str = "S1000";

/// SQLSTATE reported for warnings (severity 10 or lower) with no mapping.
pub const DEFAULT_WARNING_STATE: &str = "01000";

/// SQL Server error numbers.
pub static SQL_SERVER_STATES: &[(i32, &str)] = &[
    (105, "37000"),
    (109, "21S01"),
    (110, "21S01"),
    (113, "42000"),
    (131, "37000"),
    (168, "22003"),
    (170, "37000"),
    (174, "37000"),
    (201, "37000"),
    (206, "22005"),
    (207, "42S22"),
    (208, "42S02"),
    (210, "22007"),
    (211, "22008"),
    (213, "42000"),
    (220, "22003"),
    (229, "42000"),
    (230, "42000"),
    (232, "22003"),
    (233, "23000"),
    (234, "22003"),
    (235, "22005"),
    (236, "22003"),
    (237, "22003"),
    (238, "22003"),
    (241, "22007"),
    (242, "22008"),
    (244, "22003"),
    (245, "22018"),
    (246, "22003"),
    (247, "22005"),
    (248, "22003"),
    (249, "22005"),
    (256, "22005"),
    (257, "22005"),
    (260, "42000"),
    (262, "42000"),
    (266, "25000"),
    (272, "23000"),
    (273, "23000"),
    (277, "25000"),
    (295, "22007"),
    (296, "22008"),
    (298, "22008"),
    (305, "22005"),
    (307, "42S12"),
    (308, "42S12"),
    (310, "22025"),
    (409, "22005"),
    (506, "22019"),
    (512, "21000"),
    (515, "23000"),
    (517, "22008"),
    (518, "22005"),
    (519, "22003"),
    (520, "22003"),
    (521, "22003"),
    (522, "22003"),
    (523, "22003"),
    (524, "22003"),
    (529, "22005"),
    (530, "23000"),
    (532, "01001"),
    (535, "22003"),
    (542, "22008"),
    (544, "23000"),
    (547, "23000"),
    (550, "44000"),
    (611, "25000"),
    (626, "25000"),
    (627, "25000"),
    (628, "25000"),
    (911, "08004"),
    (1007, "22003"),
    (1010, "22019"),
    (1205, "40001"),
    (1211, "40001"),
    (1505, "23000"),
    (1508, "23000"),
    (1774, "21S02"),
    (1911, "42S22"),
    (1913, "42S11"),
    (2526, "37000"),
    (2557, "42000"),
    (2571, "42000"),
    (2601, "23000"),
    (2615, "23000"),
    (2625, "40001"),
    (2626, "23000"),
    (2627, "23000"),
    (2714, "42S01"),
    (2760, "42000"),
    (2812, "37000"),
    (3110, "42000"),
    (3309, "40001"),
    (3604, "23000"),
    (3605, "23000"),
    (3606, "22003"),
    (3607, "22012"),
    (3621, "01000"),
    (3701, "42S02"),
    (3704, "42000"),
    (3725, "23000"),
    (3726, "23000"),
    (3902, "25000"),
    (3903, "25000"),
    (3906, "25000"),
    (3908, "25000"),
    (3915, "25000"),
    (3916, "25000"),
    (3918, "25000"),
    (3919, "25000"),
    (3921, "25000"),
    (3922, "25000"),
    (3926, "25000"),
    (4415, "44000"),
    (4613, "42000"),
    (4618, "42000"),
    (4712, "23000"),
    (4834, "42000"),
    (4924, "42S22"),
    (4925, "42S21"),
    (4926, "42S22"),
    (5011, "42000"),
    (5116, "42000"),
    (5146, "22003"),
    (5812, "42000"),
    (6004, "42000"),
    (6102, "42000"),
    (6104, "37000"),
    (6401, "25000"),
    (7112, "40001"),
    (7956, "42000"),
    (7969, "25000"),
    (8114, "37000"),
    (8115, "22003"),
    (8134, "22012"),
    (8144, "37000"),
    (8152, "22001"),
    (8153, "01003"),
    (8506, "25000"),
    (10015, "22003"),
    (10033, "42S12"),
    (10055, "23000"),
    (10065, "23000"),
    (10095, "01001"),
    (11010, "42000"),
    (11011, "23000"),
    (11040, "23000"),
    (11045, "42000"),
    (14126, "42000"),
    (15247, "42000"),
    (15323, "42S12"),
    (15605, "42S11"),
    (15622, "42000"),
    (15626, "25000"),
    (15645, "42S22"),
    (16905, "24000"),
    (16909, "24000"),
    (16911, "24000"),
    (16917, "24000"),
    (16946, "24000"),
    (16950, "24000"),
    (16999, "24000"),
    (17308, "42000"),
    (17571, "42000"),
    (18002, "42000"),
    (18456, "28000"),
    (18833, "42S12"),
    (20604, "42000"),
    (21049, "42000"),
    (21166, "42S22"),
    (21255, "42S21"),
];

/// Sybase error numbers.
pub static SYBASE_STATES: &[(i32, &str)] = &[
    (102, "37000"),
    (109, "21S01"),
    (110, "21S01"),
    (113, "42000"),
    (168, "22003"),
    (201, "37000"),
    (207, "42S22"),
    (208, "42S02"),
    (213, "21S01"),
    (220, "22003"),
    (227, "22003"),
    (229, "42000"),
    (230, "42000"),
    (232, "22003"),
    (233, "23000"),
    (245, "22018"),
    (247, "22003"),
    (257, "37000"),
    (262, "42000"),
    (277, "25000"),
    (307, "42S12"),
    (512, "21000"),
];

/// Look up the SQLSTATE for an error number in one of the tables.
#[must_use]
pub fn lookup(table: &[(i32, &'static str)], number: i32) -> Option<&'static str> {
    table
        .binary_search_by_key(&number, |&(n, _)| n)
        .ok()
        .map(|idx| table[idx].1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_sorted() {
        for table in [SQL_SERVER_STATES, SYBASE_STATES] {
            assert!(table.windows(2).all(|w| w[0].0 < w[1].0));
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(lookup(SQL_SERVER_STATES, 208), Some("42S02"));
        assert_eq!(lookup(SQL_SERVER_STATES, 1205), Some("40001"));
        assert_eq!(lookup(SQL_SERVER_STATES, 16917), Some("24000"));
        assert_eq!(lookup(SYBASE_STATES, 102), Some("37000"));
        assert_eq!(lookup(SQL_SERVER_STATES, 102), None);
        assert_eq!(lookup(SYBASE_STATES, 1205), None);
    }
}
