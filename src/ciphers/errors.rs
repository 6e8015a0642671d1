define_error!(SealError; KeyLength="key must be 32 bytes", Random="cannot generate initialisation vector", Cipher="cannot encrypt");
define_error!(OpenError; KeyLength="key must be 32 bytes", DecryptFailure="cannot decrypt");
define_error!(OneWayError; MissingKey="no public key configured", PayloadTooLarge="payload too large for key", Cipher="cannot encrypt");
define_error!(PublicKeyError; Pem="cannot parse public key", NotRsa="public key is not an RSA key");
