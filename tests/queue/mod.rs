//! Request queue scenario tests.

mod scheduling_test;
