use std::fmt::Write;

use anyhow::{Context, Result, bail};

use crate::grid::{Grid, parse_grid};
use crate::models::TestCase;

const PRELUDE: &str = r#"#include <chrono>
#include <cmath>
#include <csignal>
#include <cstdio>
#include <cstdlib>
#include <exception>
#include <vector>
#include <unistd.h>
"#;

const DRIVER: &str = r#"
namespace sudoku_oj_harness {

enum Status {
    PASS = 0,
    OUT_OF_RANGE = 1,
    CLUE_VIOLATION = 2,
    INVALID_SOLUTION = 3,
    MISMATCH = 4,
    RUNTIME_FAULT = 5,
};

static int check(int idx, const std::vector<std::vector<int>>& out) {
    if (out.size() != 9) return OUT_OF_RANGE;
    for (const auto& row : out) {
        if (row.size() != 9) return OUT_OF_RANGE;
        for (int v : row) {
            if (v < 1 || v > 9) return OUT_OF_RANGE;
        }
    }
    for (int r = 0; r < 9; ++r) {
        for (int c = 0; c < 9; ++c) {
            if (INPUTS[idx][r][c] != 0 && out[r][c] != INPUTS[idx][r][c]) return CLUE_VIOLATION;
        }
    }
    for (int i = 0; i < 9; ++i) {
        bool row_seen[10] = {false};
        bool col_seen[10] = {false};
        bool box_seen[10] = {false};
        for (int j = 0; j < 9; ++j) {
            int a = out[i][j];
            int b = out[j][i];
            int c = out[(i / 3) * 3 + j / 3][(i % 3) * 3 + j % 3];
            if (row_seen[a] || col_seen[b] || box_seen[c]) return INVALID_SOLUTION;
            row_seen[a] = true;
            col_seen[b] = true;
            box_seen[c] = true;
        }
    }
    for (int r = 0; r < 9; ++r) {
        for (int c = 0; c < 9; ++c) {
            if (out[r][c] != EXPECTED[idx][r][c]) return MISMATCH;
        }
    }
    return PASS;
}

// Preformatted so the fault handler only needs write(2)
static char fault_line[64];
static int fault_line_len = 0;

static void on_fault(int) {
    if (fault_line_len > 0) {
        ssize_t written = write(STDOUT_FILENO, fault_line, fault_line_len);
        (void)written;
    }
    _exit(RUNTIME_FAULT);
}

static void install_fault_handlers() {
    static char alt_stack[1 << 16];
    stack_t ss{};
    ss.ss_sp = alt_stack;
    ss.ss_size = sizeof(alt_stack);
    sigaltstack(&ss, nullptr);

    struct sigaction sa{};
    sa.sa_handler = on_fault;
    sigemptyset(&sa.sa_mask);
    sa.sa_flags = SA_ONSTACK;
    for (int sig : {SIGSEGV, SIGFPE, SIGBUS, SIGILL, SIGABRT}) sigaction(sig, &sa, nullptr);
}

}  // namespace sudoku_oj_harness

int main() {
    sudoku_oj_harness::install_fault_handlers();
    for (int idx = 0; idx < sudoku_oj_harness::CASE_COUNT; ++idx) {
        std::vector<std::vector<int>> grid(9, std::vector<int>(9));
        for (int r = 0; r < 9; ++r) {
            for (int c = 0; c < 9; ++c) grid[r][c] = sudoku_oj_harness::INPUTS[idx][r][c];
        }

        int status = sudoku_oj_harness::PASS;
        sudoku_oj_harness::fault_line_len = std::snprintf(
            sudoku_oj_harness::fault_line, sizeof(sudoku_oj_harness::fault_line),
            "CASE %d STATUS %d TIME_MS 0\n", idx, sudoku_oj_harness::RUNTIME_FAULT);
        std::vector<std::vector<int>> out;
        auto start = std::chrono::steady_clock::now();
        try {
            out = solve(grid);
        } catch (...) {
            status = sudoku_oj_harness::RUNTIME_FAULT;
        }
        long long elapsed_ms = std::llround(std::chrono::duration<double, std::milli>(
            std::chrono::steady_clock::now() - start).count());

        if (status == sudoku_oj_harness::PASS) status = sudoku_oj_harness::check(idx, out);

        std::printf("CASE %d STATUS %d TIME_MS %lld\n", idx, status, elapsed_ms);
        std::fflush(stdout);
        if (status != sudoku_oj_harness::PASS) return status;
    }
    return 0;
}
"#;

/// Builds one C++ program embedding the submission, every case, and a driver
/// that reports `CASE <i> STATUS <s> TIME_MS <t>` and stops at the first
/// failing case.
///
/// Exceptions and crash signals raised while a case runs are reported as
/// that case's runtime fault before the process exits.
///
/// The submission must define
/// `std::vector<std::vector<int>> solve(std::vector<std::vector<int>> grid)`.
/// It is pasted in verbatim, nothing about it is checked here.
pub fn generate_harness(source_code: &str, cases: &[TestCase]) -> Result<String> {
    if cases.is_empty() {
        bail!("problem has no test cases");
    }

    let mut inputs = Vec::with_capacity(cases.len());
    let mut expected = Vec::with_capacity(cases.len());
    for case in cases {
        inputs.push(
            parse_grid(&case.input)
                .with_context(|| format!("test case {} has a malformed input grid", case.id))?,
        );
        expected.push(
            parse_grid(&case.expected_output)
                .with_context(|| format!("test case {} has a malformed expected grid", case.id))?,
        );
    }

    let mut program = String::with_capacity(source_code.len() + DRIVER.len() + cases.len() * 512);
    program.push_str(PRELUDE);
    program.push('\n');
    program.push_str(source_code);
    program.push_str("\n\nnamespace sudoku_oj_harness {\n\n");
    writeln!(program, "constexpr int CASE_COUNT = {};", cases.len())?;
    write_grid_table(&mut program, "INPUTS", &inputs)?;
    write_grid_table(&mut program, "EXPECTED", &expected)?;
    program.push_str("\n}  // namespace sudoku_oj_harness\n");
    program.push_str(DRIVER);

    Ok(program)
}

fn write_grid_table(out: &mut String, name: &str, grids: &[Grid]) -> std::fmt::Result {
    writeln!(out, "static const int {name}[CASE_COUNT][9][9] = {{")?;
    for grid in grids {
        out.push_str("    {");
        for (r, row) in grid.iter().enumerate() {
            if r > 0 {
                out.push(',');
            }
            let cells: Vec<String> = row.iter().map(|d| d.to_string()).collect();
            write!(out, "{{{}}}", cells.join(","))?;
        }
        out.push_str("},\n");
    }
    writeln!(out, "}};")
}
