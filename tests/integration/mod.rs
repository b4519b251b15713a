//! Integration tests against a fixture mstables database.
