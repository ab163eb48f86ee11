//! End-to-end solver tests.
use fascicle::{CnfFormula, Solution, Solver};

use fascicle_formula::test::pigeon_hole_formula;
use fascicle_formula::{cnf_formula, lit};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn check_sat(formula: &CnfFormula, seed: u64) {
    init_logging();
    let mut solver = Solver::with_seed(formula, seed);

    assert!(solver.solve().is_sat());

    let model = solver.model().expect("no model for sat formula");
    for clause in formula.iter() {
        assert!(
            clause.iter().any(|lit| model.contains(lit)),
            "clause {:?} not satisfied by {:?}",
            clause,
            model
        );
    }
}

fn check_unsat(formula: &CnfFormula, seed: u64) {
    init_logging();
    let mut solver = Solver::with_seed(formula, seed);

    assert_eq!(solver.solve(), Solution::Unsat);
    assert!(solver.model().is_none());
}

#[test]
fn small_implication_cycle_is_sat() {
    let formula = cnf_formula![
        1, 2;
        -1, 3;
        2, -3;
        -2, -4;
        -3, 4;
    ];

    for seed in 0..10 {
        check_sat(&formula, seed);
    }
}

#[test]
fn dense_three_sat_instance_is_sat() {
    let formula = cnf_formula![
        1, 2, -3;
        2, 3, -4;
        3, 4, 1;
        4, -1, 2;
        -1, -2, 3;
        -2, -3, 4;
        -3, -4, -1;
    ];

    for seed in 0..10 {
        check_sat(&formula, seed);
    }
}

#[test]
fn one_more_clause_tips_it_to_unsat() {
    let formula = cnf_formula![
        1, 2, -3;
        2, 3, -4;
        3, 4, 1;
        4, -1, 2;
        -1, -2, 3;
        -2, -3, 4;
        -3, -4, -1;
        -4, 1, -2;
    ];

    for seed in 0..10 {
        check_unsat(&formula, seed);
    }
}

#[test]
fn unit_forces_ripple_through() {
    let formula = cnf_formula![
        1, 3;
        -2, -3, 5;
        2;
    ];

    check_sat(&formula, 0);

    let mut solver = Solver::with_seed(&formula, 0);
    solver.solve();
    let model = solver.model().unwrap();
    assert!(model.contains(&lit!(2)));
}

#[test]
fn forced_chain_has_a_unique_model() {
    let formula = cnf_formula![
        1;
        -1, 2, 3;
        -2, -1;
    ];

    let mut solver = Solver::with_seed(&formula, 3);
    match solver.solve() {
        Solution::Sat(values) => assert_eq!(values, [true, false, true]),
        Solution::Unsat => panic!("expected sat"),
    }
}

#[test]
fn pigeon_hole_6_is_unsat() {
    // 6 pigeons into 5 holes
    check_unsat(&pigeon_hole_formula(5), 0);
}

#[test]
fn pigeon_holes_with_enough_holes_are_sat() {
    init_logging();

    // 4 pigeons into 4 holes: drop the clauses of the 5th pigeon
    let hole4 = pigeon_hole_formula(4);
    let mut formula = CnfFormula::new();
    for clause in hole4.iter() {
        if clause.iter().all(|lit| lit.index() < 16) {
            formula.add_clause(clause);
        }
    }
    formula.set_var_count(16);

    check_sat(&formula, 1);
}

#[test]
fn same_seed_is_deterministic() {
    let formula = cnf_formula![
        1, 2, -3;
        2, 3, -4;
        -1, -2, 3;
        -2, -3, 4;
        3, 4, 1;
    ];

    let first = Solver::with_seed(&formula, 31337).solve();
    let second = Solver::with_seed(&formula, 31337).solve();

    assert_eq!(first, second);
}

#[test]
fn solves_formulas_parsed_from_dimacs() {
    init_logging();

    let input = b"c hole-3 pigeonhole\np cnf 12 22\n1 2 3 0\n4 5 6 0\n7 8 9 0\n10 11 12 0\n-1 -4 0\n-1 -7 0\n-1 -10 0\n-4 -7 0\n-4 -10 0\n-7 -10 0\n-2 -5 0\n-2 -8 0\n-2 -11 0\n-5 -8 0\n-5 -11 0\n-8 -11 0\n-3 -6 0\n-3 -9 0\n-3 -12 0\n-6 -9 0\n-6 -12 0\n-9 -12 0\n";

    let formula = fascicle_dimacs::parse_dimacs(&input[..]).expect("parse failed");

    check_unsat(&formula, 7);
}
