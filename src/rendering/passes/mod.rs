pub mod letter_pass;
