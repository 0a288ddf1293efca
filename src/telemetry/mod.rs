pub(crate) mod refresh;
