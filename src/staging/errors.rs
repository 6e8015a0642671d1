define_error!(StorageError; InvalidTtl="ttl must be positive", Serialise="cannot serialise record", Timeout="store timed out", Command="store command failed", Corrupt="stored record is corrupt");
