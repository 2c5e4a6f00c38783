mod facades;
mod ordering;
mod sharding;
