mod push_tests;
mod support;
