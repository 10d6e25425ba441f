//! Scenario tests: whole matrix runs against a scripted runner

mod helpers;

mod failure_handling;
mod gate_verdict;
mod matrix_expansion;
mod runner_selection;
mod workspace_isolation;
